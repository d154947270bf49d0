use std::path::PathBuf;

use clap::Parser;

use crate::config::StoreConfig;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Server listening host
    #[arg(long, env = "ASSET_SERVER_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Server listening port
    #[arg(short, long, env = "ASSET_SERVER_PORT", default_value_t = 8970)]
    pub port: u16,

    /// Object store backend type: S3, FILESYSTEM or MEMORY
    #[arg(short, long, env = "ASSET_SERVER_STORAGE", default_value = "S3")]
    pub storage: String,

    /// Root directory of the FILESYSTEM backend
    #[arg(
        long,
        env = "ASSET_SERVER_ROOTDIR",
        default_value = "/var/lib/s3-image-store"
    )]
    pub root: String,

    /// Directory for uploads in flight and compression artifacts
    #[arg(long, env = "ASSET_SERVER_SCRATCH_DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// Bucket name
    #[arg(long, env = "S3_BUCKET")]
    pub bucket: String,

    /// Bucket region
    #[arg(long, env = "S3_REGION", default_value = "us-east-1")]
    pub region: String,

    /// Static access key id; the default credential chain is used when unset
    #[arg(long, env = "S3_ACCESS_KEY_ID")]
    pub access_key_id: Option<String>,

    /// Static secret access key
    #[arg(long, env = "S3_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub secret_access_key: Option<String>,

    /// Public base URL of stored assets, overriding the region-derived one
    #[arg(long, env = "S3_ASSET_HOST")]
    pub asset_host: Option<String>,

    /// Key prefix every upload is stored under
    #[arg(long, env = "S3_PATH_PREFIX", default_value = "")]
    pub path_prefix: String,

    /// Endpoint of an S3-compatible service
    #[arg(long, env = "S3_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Address buckets by path instead of virtual host
    #[arg(long, env = "S3_FORCE_PATH_STYLE", default_value_t = false)]
    pub force_path_style: bool,

    /// Turn off `If-None-Match` uploads for stores that reject them
    #[arg(long, env = "S3_DISABLE_CONDITIONAL_WRITES", default_value_t = false)]
    pub disable_conditional_writes: bool,
}

impl Args {
    pub fn store_config(&self) -> StoreConfig {
        let mut config = StoreConfig::new(&self.bucket, &self.region)
            .with_path_prefix(&self.path_prefix)
            .with_force_path_style(self.force_path_style)
            .with_conditional_writes(!self.disable_conditional_writes);

        if let (Some(id), Some(secret)) = (&self.access_key_id, &self.secret_access_key) {
            config = config.with_credentials(id, secret);
        }
        if let Some(endpoint) = &self.endpoint {
            config = config.with_endpoint(endpoint);
        }
        if let Some(dir) = &self.scratch_dir {
            config = config.with_scratch_dir(dir);
        }
        match &self.asset_host {
            Some(host) => config.with_asset_host(host),
            // the server proxies reads itself when files never reach S3
            None if self.storage != "S3" => config.with_asset_host(format!(
                "http://{}:{}/content/images",
                self.host, self.port
            )),
            None => config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_config_from_args() {
        let args = Args::parse_from([
            "s3-image-store",
            "--bucket",
            "my-bucket",
            "--region",
            "eu-west-1",
            "--path-prefix",
            "/images",
        ]);
        let config = args.store_config();
        assert_eq!(config.bucket(), "my-bucket");
        assert_eq!(config.path_prefix(), "images");
        assert_eq!(config.host(), "https://s3-eu-west-1.amazonaws.com/my-bucket");
        assert!(config.conditional_writes());
        assert!(config.credentials().is_none());
    }

    #[test]
    fn test_local_backends_serve_through_the_proxy() {
        let args = Args::parse_from([
            "s3-image-store",
            "--bucket",
            "local",
            "--storage",
            "FILESYSTEM",
            "--port",
            "9000",
        ]);
        assert_eq!(
            args.store_config().host(),
            "http://127.0.0.1:9000/content/images"
        );
    }
}
