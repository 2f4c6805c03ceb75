// ==========================================
// 产程图质控系统 - 命令行入口
// ==========================================
// 用法:
//   partograph-cds classify <start> <end> [facility_id] [--db <path>]
//   partograph-cds validate <delivery_id> <validator> [--db <path>]
// 日期格式: YYYY-MM-DD (闭区间)
// 数据库路径: --db → PARTOGRAPH_CDS_DB_PATH → 用户数据目录
// ==========================================

use anyhow::{anyhow, bail, Context, Result};
use chrono::{NaiveDate, Utc};
use partograph_cds::app::{get_default_db_path, AppState};
use partograph_cds::engine::CancellationFlag;
use partograph_cds::logging;

const USAGE: &str = "用法:
  partograph-cds classify <start> <end> [facility_id] [--db <path>]
  partograph-cds validate <delivery_id> <validator> [--db <path>]";

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let (db_path, args) = split_db_arg(std::env::args().skip(1).collect())?;
    let db_path = db_path.unwrap_or_else(get_default_db_path);

    tracing::info!(version = partograph_cds::VERSION, db_path = %db_path, "{}", partograph_cds::APP_NAME);

    let state = AppState::new(db_path).context("无法初始化数据库")?;

    match args.first().map(String::as_str) {
        Some("classify") => run_classify(&state, &args[1..]).await,
        Some("validate") => run_validate(&state, &args[1..]),
        _ => bail!("{}", USAGE),
    }
}

async fn run_classify(state: &AppState, args: &[String]) -> Result<()> {
    if args.len() < 2 || args.len() > 3 {
        bail!("{}", USAGE);
    }
    let start = parse_date(&args[0])?;
    let end = parse_date(&args[1])?;
    let facility_id = args.get(2).map(String::as_str);

    let config = state
        .config_manager
        .load_classification_config()
        .await
        .context("配置加载失败")?;

    let runner = state.batch_runner(&config);
    let report = runner.classify_range(start, end, facility_id, &CancellationFlag::new())?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_validate(state: &AppState, args: &[String]) -> Result<()> {
    let [delivery_id, validator] = args else {
        bail!("{}", USAGE);
    };

    state
        .classification_repo
        .mark_validated(delivery_id, validator, Utc::now().naive_utc())?;

    tracing::info!(delivery_id = %delivery_id, validator = %validator, "分类已审核");
    Ok(())
}

/// 抽取 `--db <path>` 参数, 返回 (db_path, 其余参数)
fn split_db_arg(args: Vec<String>) -> Result<(Option<String>, Vec<String>)> {
    let mut db_path = None;
    let mut rest = Vec::with_capacity(args.len());
    let mut iter = args.into_iter();

    while let Some(arg) = iter.next() {
        if arg == "--db" {
            let path = iter.next().ok_or_else(|| anyhow!("--db 缺少路径参数"))?;
            db_path = Some(path);
        } else {
            rest.push(arg);
        }
    }

    Ok((db_path, rest))
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("日期格式错误 (应为 YYYY-MM-DD): {}", s))
}
