use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use clap::{Parser, ValueEnum};
use log::info;

use crate::cli::SubCommandExtend;
use crate::config::{GeminiOptions, Opts};
use crate::format::ImageFormat;
use crate::gemini::GeminiClient;
use crate::relay::{AnalysisItem, Relay};

#[derive(Parser, Debug, Clone)]
pub struct AnalyzeCommand {
    #[command(flatten)]
    pub gemini: GeminiOptions,
    /// 被分析的图片路径
    pub image: PathBuf,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for AnalyzeCommand {
    async fn run(&self, _opts: &Opts) -> Result<()> {
        let format = ImageFormat::from_path(&self.image).ok_or_else(|| {
            anyhow!(
                "不支持的图片格式: {}，可用格式: {}",
                self.image.display(),
                ImageFormat::ALLOWED
            )
        })?;
        let image = tokio::fs::read(&self.image).await?;

        let relay = Relay::new(Arc::new(GeminiClient::new(&self.gemini)?), self.gemini.timeout());
        info!("正在分析 {}", self.image.display());
        let result = relay.analyze(&image, format.mime()).await?;

        print_result(&result, &self.output_format)
    }
}

fn print_result(result: &[AnalysisItem], format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?)
        }
        OutputFormat::Table => {
            for item in result {
                println!("{:.2}\t{}", item.confidence, item.label);
            }
        }
    }
    Ok(())
}

#[derive(ValueEnum, Debug, Clone)]
pub enum OutputFormat {
    Json,
    Table,
}
