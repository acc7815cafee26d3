use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_SHA"),
    ", ",
    env!("BUILD_DATE"),
    ")"
);

#[derive(Parser, Debug, Default)]
#[command(name = "radiod", version = VERSION)]
pub struct Args {
    /// Server config file (TOML); defaults to ./config.toml when present
    #[arg(long, env = "RADIOD_CONFIG")]
    pub config: Option<PathBuf>,

    /// HTTP bind address, e.g. 0.0.0.0:7000
    #[arg(long, env = "RADIOD_BIND")]
    pub bind: Option<SocketAddr>,

    /// Directory of already-encoded tracks, one sub-directory per station
    #[arg(long, env = "RADIOD_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Extension of the encoded tracks (mp3, aac, ogg)
    #[arg(long, env = "RADIOD_OUTPUT_FORMAT")]
    pub output_format: Option<String>,

    /// Output bitrate used for pacing, e.g. 96k or 128000
    #[arg(long, env = "RADIOD_OUTPUT_BITRATE")]
    pub output_bitrate: Option<String>,

    /// Read-ahead window per station in seconds
    #[arg(long, env = "RADIOD_BUFFER_SECONDS")]
    pub buffer_seconds: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_parse_overrides() {
        let args = Args::try_parse_from([
            "radiod",
            "--bind",
            "127.0.0.1:9000",
            "--cache-dir",
            "/srv/cache",
            "--output-bitrate",
            "128k",
            "--buffer-seconds",
            "3",
        ])
        .expect("parse args");
        assert_eq!(args.bind, Some("127.0.0.1:9000".parse().unwrap()));
        assert_eq!(args.cache_dir, Some(PathBuf::from("/srv/cache")));
        assert_eq!(args.output_bitrate.as_deref(), Some("128k"));
        assert_eq!(args.buffer_seconds, Some(3));
        assert!(args.config.is_none());
    }

    #[test]
    fn every_flag_has_an_env_override() {
        use clap::CommandFactory;

        let cmd = Args::command();
        let envs = cmd
            .get_arguments()
            .filter_map(|arg| arg.get_env())
            .map(|env| env.to_string_lossy().to_string())
            .collect::<Vec<_>>();
        for name in [
            "RADIOD_CONFIG",
            "RADIOD_BIND",
            "RADIOD_CACHE_DIR",
            "RADIOD_OUTPUT_FORMAT",
            "RADIOD_OUTPUT_BITRATE",
            "RADIOD_BUFFER_SECONDS",
        ] {
            assert!(envs.iter().any(|env| env == name), "{name}");
        }
    }

    #[test]
    fn args_default_to_none() {
        let args = Args::try_parse_from(["radiod"]).expect("parse args");
        assert!(args.bind.is_none());
        assert!(args.cache_dir.is_none());
    }
}
