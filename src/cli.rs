use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "invoice-scan")]
#[command(about = "請求書画像をOCRサービスに送り、テキスト/CSVを取得する", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 画像を解析して結果を表示
    Analyze {
        /// 画像ファイルのパス
        #[arg(required = true)]
        image: PathBuf,

        /// 請求書データのみ抽出（filter=true）
        #[arg(short, long)]
        filter: bool,

        /// OCRエンドポイント（設定ファイルより優先）
        #[arg(short, long)]
        endpoint: Option<String>,

        /// 結果をCSVとして保存（ディレクトリ指定時は factura.csv）
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 設定を表示/編集
    Config {
        /// OCRエンドポイントを設定
        #[arg(long)]
        set_endpoint: Option<String>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}
