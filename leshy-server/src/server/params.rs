use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "leshy-server")]
pub struct Params {
    #[arg(long, env = "LESHY_BASE_DIR", default_value = "./data")]
    pub base_dir: String,

    #[arg(long, env = "LESHY_PORT", default_value_t = 50051)]
    pub port: u16,

    /// Optional TOML file overriding the broker timing defaults.
    #[arg(long, env = "LESHY_CONFIG")]
    pub config: Option<String>,
}
