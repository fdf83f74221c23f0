mod config;
mod device;
mod support;
mod transport;
