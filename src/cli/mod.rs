mod add;
mod drop;
mod export;
mod search;
pub mod server;
mod setup;
mod show;
mod similar;

pub use add::*;
pub use drop::*;
pub use export::*;
pub use search::*;
pub use server::*;
pub use setup::*;
pub use show::*;
pub use similar::*;

use crate::config::Opts;
use crate::db::SqliteStore;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}

/// 打开配置目录下的数据库，目录不存在时自动创建
pub async fn open_store(opts: &Opts) -> anyhow::Result<SqliteStore> {
    if !opts.conf_dir.path().exists() {
        tokio::fs::create_dir_all(opts.conf_dir.path()).await?;
    }
    Ok(SqliteStore::open(opts.conf_dir.database()).await?)
}
