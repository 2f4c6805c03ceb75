// ==========================================
// 产程图质控系统 - 应用层
// ==========================================
// 职责: 组装仓储、配置与引擎, 供二进制入口使用
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState, DB_PATH_ENV};
