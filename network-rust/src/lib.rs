pub mod udpnet;
