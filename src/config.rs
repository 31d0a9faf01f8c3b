use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    time::Duration,
};

use crate::{
    catalog::Catalog,
    handlers::{Handler, Registry},
    registration::RegistrationLog,
    server::Limits,
};

#[derive(clap::Parser, Debug)]
#[command(version, about = "Course registration server", long_about = None)]
pub struct Config {
    #[arg(long, default_value = "0.0.0.0")]
    pub address: IpAddr,

    #[arg(long)]
    pub port: u16,

    /// tab separated course catalog: code, name, session
    #[arg(long, default_value = "data/cours.txt")]
    pub catalog: PathBuf,

    /// registrations are appended to this file
    #[arg(long, default_value = "data/inscription.txt")]
    pub registrations: PathBuf,

    /// seconds a client has to send its request
    #[arg(long = "read-timeout", default_value_t = 30)]
    pub read_timeout_secs: u64,

    #[arg(long, default_value_t = 64, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_connections: u32,
}

impl Config {
    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }

    pub fn limits(&self) -> Limits {
        Limits {
            read_timeout: Duration::from_secs(self.read_timeout_secs),
            max_connections: self.max_connections,
        }
    }

    /// builds the registry with the load and register handlers, in that order
    pub fn registry(&self) -> Registry {
        let mut registry = Registry::default();
        registry.register(Handler::Load(Catalog::new(&self.catalog)));
        registry.register(Handler::Register(RegistrationLog::new(
            &self.registrations,
        )));

        registry
    }
}
