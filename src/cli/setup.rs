use anyhow::Result;
use clap::Parser;
use log::info;

use crate::cli::{SubCommandExtend, open_store};
use crate::config::Opts;
use crate::db::SqliteStore;
use crate::module::FeatureModule;
use crate::query::RetrieverConfig;

#[derive(Parser, Debug, Clone)]
pub struct SetupCommand {}

impl SubCommandExtend for SetupCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let store = open_store(opts).await?;
        let config = RetrieverConfig::default();
        let module = FeatureModule::<_, SqliteStore>::new(opts.transform(), config)
            .with_entity(opts.entity());
        module.initialize_persistent_layer(&store).await?;
        info!("已创建实体: {}", module.entity());
        Ok(())
    }
}
