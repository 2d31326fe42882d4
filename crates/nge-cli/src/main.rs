//! NGE 거래 엔진 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 로그인 정보 저장 (identity / 비밀번호는 표준 입력으로)
//! ngecli login trade:8080
//!
//! # 현재 설정 보기
//! ngecli -H trade -P 8080 config
//!
//! # 과거 주문 조회
//! ngecli order get -s "2019-03-01 00:00:00" -c 50 -r
//!
//! # 랜덤 가격/수량으로 양방향 주문 10쌍 생성
//! ngecli --auth auths.csv order new --random --both-side -c 10
//! ```

use std::io;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use nge_core::{init_logging, LogConfig, OrderSide};
use nge_execution::{BatchSpec, PriceRange, VolumeRange};
use rust_decimal::Decimal;
use tracing::{error, info};

use nge_cli::commands::config::render_config;
use nge_cli::commands::login::{login_hosts, LoginConfig};
use nge_cli::commands::order::{get_orders, new_orders, OrderGetConfig, DEFAULT_GET_ORDER_COUNT};
use nge_cli::session::{open_shadow, Session};
use nge_cli::settings::{parse_flag_time, GlobalArgs};

#[derive(Parser)]
#[command(name = "ngecli")]
#[command(about = "CLI for the NGE trade engine", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 거래 엔진에 로그인하고 로그인 정보를 저장
    Login {
        /// 로그인할 호스트 목록 (host[:port]), 비어 있으면 설정의 호스트
        hosts: Vec<String>,
    },

    /// 현재 설정을 JSON으로 출력
    Config,

    /// 주문 명령
    #[command(subcommand)]
    Order(OrderCommands),
}

#[derive(Subcommand)]
enum OrderCommands {
    /// 과거 주문 조회
    Get(OrderGetArgs),

    /// 새 주문 생성
    New(OrderNewArgs),
}

#[derive(Args)]
struct OrderGetArgs {
    /// 조회 결과 필터 (JSON)
    #[arg(long)]
    filter: Option<String>,

    /// 조회할 컬럼 목록
    #[arg(long)]
    columns: Option<String>,

    /// 시작 시간 (YYYY-MM-DD HH:MM:SS)
    #[arg(short, long, value_parser = parse_flag_time)]
    start: Option<chrono::DateTime<chrono::Utc>>,

    /// 종료 시간 (YYYY-MM-DD HH:MM:SS)
    #[arg(short, long, value_parser = parse_flag_time)]
    end: Option<chrono::DateTime<chrono::Utc>>,

    /// 조회 건수
    #[arg(short, long, default_value_t = DEFAULT_GET_ORDER_COUNT)]
    count: u32,

    /// 역순 조회
    #[arg(short, long)]
    reverse: bool,
}

#[derive(Args)]
struct OrderNewArgs {
    /// 주문 가격
    #[arg(short, long)]
    price: Option<Decimal>,

    /// 주문 수량 (방향 미지정 시 부호로 방향 결정)
    #[arg(short, long, allow_hyphen_values = true)]
    volume: Option<i64>,

    /// 주문 방향 (Buy, Sell)
    #[arg(long)]
    side: Option<OrderSide>,

    /// 랜덤 주문 기준 가격
    #[arg(long, default_value = "5050")]
    base_price: Decimal,

    /// 가격 틱
    #[arg(long, default_value = "0.01")]
    tick: Decimal,

    /// 랜덤 주문 최소 수량
    #[arg(long, default_value_t = 1)]
    base_volume: i64,

    /// 랜덤 주문 최대 수량
    #[arg(long, default_value_t = 10)]
    max_volume: i64,

    /// 지정하지 않은 가격/수량을 랜덤으로 생성
    #[arg(long)]
    random: bool,

    /// 같은 가격/수량으로 매수와 매도를 함께 생성
    #[arg(long)]
    both_side: bool,

    /// 생성할 주문 수
    #[arg(short, long, default_value_t = 1)]
    count: usize,
}

impl OrderNewArgs {
    fn into_spec(self, symbol: &str) -> BatchSpec {
        BatchSpec {
            symbol: symbol.to_string(),
            price: self.price,
            volume: self.volume,
            side: self.side,
            price_range: PriceRange {
                base: self.base_price,
                tick: self.tick,
            },
            volume_range: VolumeRange {
                base: self.base_volume,
                max: self.max_volume,
            },
            random: self.random,
            both_side: self.both_side,
            count: self.count,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = cli.global.load_config()?;

    if let Err(e) = init_logging(LogConfig::from_settings(&config.logging)) {
        eprintln!("logging init failed: {}", e);
    }

    let result = run(cli.command, cli.global, config).await;
    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}

async fn run(command: Commands, global: GlobalArgs, config: nge_core::AppConfig) -> Result<()> {
    match command {
        Commands::Login { hosts } => {
            let shadow = open_shadow(&config)?;
            let stdin = io::stdin();
            let saved = login_hosts(
                &config,
                LoginConfig { hosts },
                shadow,
                &mut stdin.lock(),
                &mut io::stderr(),
            )
            .await?;
            info!(hosts = saved, "로그인 정보 저장 완료");
        }

        Commands::Config => {
            println!("{}", render_config(&config)?);
        }

        Commands::Order(OrderCommands::Get(args)) => {
            let source = global.pool_source(&config.endpoint);
            let session = Session::open(config, source)?;

            let get = OrderGetConfig {
                filter: args.filter,
                columns: args.columns,
                start: args.start,
                end: args.end,
                count: args.count,
                reverse: args.reverse,
            };
            let printed = get_orders(&session, &get, io::stdout()).await?;
            info!(count = printed, "주문 조회 출력 완료");
        }

        Commands::Order(OrderCommands::New(args)) => {
            let source = global.pool_source(&config.endpoint);
            let session = Session::open(config, source)?;

            let spec = args.into_spec(&session.config.endpoint.symbol);
            let summary = new_orders(&session, &spec, io::stdout()).await?;

            if summary.failed > 0 {
                anyhow::bail!(
                    "{} of {} orders failed",
                    summary.failed,
                    summary.submitted + summary.failed
                );
            }
        }
    }

    Ok(())
}
