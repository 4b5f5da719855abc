use std::fmt;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::cli::*;

#[derive(Parser, Clone)]
pub struct GeminiOptions {
    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true, value_parser = parse_api_key)]
    pub api_key: String,
    /// 使用的模型名称
    #[arg(long, value_name = "MODEL", default_value = "gemini-1.5-flash")]
    pub model: String,
    /// Gemini API 地址
    #[arg(long, value_name = "URL", default_value = "https://generativelanguage.googleapis.com")]
    pub endpoint: String,
    /// 单次模型调用的超时时间，单位为秒
    #[arg(long, value_name = "SECONDS", default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: u64,
}

impl GeminiOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

// 不能把 API key 打印到日志里
impl fmt::Debug for GeminiOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiOptions")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "imanalyze", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 分析一张本地图片
    Analyze(AnalyzeCommand),
    /// 启动 HTTP 分析服务
    Server(ServerCommand),
}

fn parse_api_key(s: &str) -> Result<String, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("API key 不能为空".to_string());
    }
    Ok(s.to_string())
}
