// ==========================================
// 产程图质控系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化
// ==========================================

pub mod classification_repo;
pub mod data_quality_repo;
pub mod delivery_repo;
pub mod error;

// 重导出核心仓储
pub use classification_repo::RobsonClassificationRepository;
pub use data_quality_repo::DataQualityRepository;
pub use delivery_repo::DeliveryRepository;
pub use error::{RepositoryError, RepositoryResult};
