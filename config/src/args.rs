use clap::Parser;
use std::{
    net::SocketAddr,
    path::PathBuf,
};

/// Media Command Center
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version = version(), about, long_about = None)]
pub struct Args {
    /// Extra YAML file layered on top of the user config.
    #[arg(long, value_name = "FILE", env = "MCC_CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Address the HTTP/WebSocket server listens on.
    #[arg(long, value_name = "ADDR", env = "MCC_LISTEN")]
    pub listen: Option<SocketAddr>,

    /// Run every collector once, print the envelopes and exit.
    #[arg(long, action)]
    pub once: bool,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, action)]
    pub verbose: bool,
}

mod config_ext {
    use super::*;
    use config::{
        Map,
        Source,
        Value,
    };
    use std::collections::HashMap;

    impl Source for Args {
        fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
            Box::new((*self).clone())
        }

        fn collect(&self) -> Result<Map<String, Value>, config::ConfigError> {
            let mut cache = HashMap::<String, Value>::new();
            if let Some(listen) = &self.listen {
                cache.insert("server.listen_address".to_string(), listen.to_string().into());
            }
            Ok(cache)
        }
    }
}

pub fn version() -> String {
    let author = clap::crate_authors!();
    let config_dir_path = crate::get_config_dir().display().to_string();

    format!(
        "{}\n\
Authors: {author}

Config directory: {config_dir_path}",
        clap::crate_version!()
    )
}
