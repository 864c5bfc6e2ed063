use std::error;
use std::io;
use std::str;

use crossbeam_channel as cbc;
use crossbeam_channel::SendError;
use log::warn;
use serde::Deserialize;
use socket2::Socket;

use super::sock;

pub enum BcError<T> {
    IOError(io::Error),
    SendError(SendError<T>),
}

impl<T> From<io::Error> for BcError<T> {
    fn from(e: io::Error) -> Self {
        BcError::IOError(e)
    }
}

impl<T> From<SendError<T>> for BcError<T> {
    fn from(e: SendError<T>) -> Self {
        BcError::SendError(e)
    }
}

/// Serialize every value received on `ch` and broadcast it on `port`.
///
/// Returns `Err` when creating the socket fails. Send errors after that are
/// logged and ignored; the next periodic message recovers transient loss.
pub fn tx<T: serde::Serialize>(port: u16, ch: cbc::Receiver<T>) -> io::Result<()> {
    let (s, addr) = sock::new_tx(port)?;
    loop {
        let data = ch.recv().unwrap();
        let serialized = serde_json::to_string(&data).unwrap();
        if let Err(e) = s.send_to(serialized.as_bytes(), &addr) {
            warn!("unable to send packet on port {}: {}", port, e);
        }
    }
}

/// Forward every well-formed `T` datagram received on `port` to `ch`.
///
/// Returns `Err` when creating the socket fails or when the channel is
/// disconnected. Malformed datagrams are logged and dropped.
pub fn rx<T: serde::de::DeserializeOwned>(port: u16, ch: cbc::Sender<T>) -> Result<(), BcError<T>> {
    let s = sock::new_rx(port)?;

    let mut buf = [0; 4096];

    loop {
        match parse_packet(&s, &mut buf) {
            Ok(d) => ch.send(d)?,
            Err(e) => warn!("received bad packet on port {}: {}", port, e),
        }
    }
}

fn parse_packet<'a, T: Deserialize<'a>>(
    s: &'_ Socket,
    buf: &'a mut [u8; 4096],
) -> Result<T, Box<dyn error::Error>> {
    let n = s.recv(buf)?;
    let msg = str::from_utf8(&buf[..n])?;
    serde_json::from_str::<T>(msg).map_err(|e| e.into())
}
