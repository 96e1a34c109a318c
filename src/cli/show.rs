use anyhow::Result;
use clap::Parser;

use crate::cli::{SubCommandExtend, open_store};
use crate::config::Opts;
use crate::db;

#[derive(Parser, Debug, Clone)]
pub struct ShowCommand {}

impl SubCommandExtend for ShowCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let store = open_store(opts).await?;
        let entity = opts.entity();
        match db::describe_entity(&store, &entity).await? {
            Some(info) => {
                println!("实体    : {}", info.name);
                println!("唯一键  : {}", info.unique_key);
                match info.dimension {
                    Some(dimension) => println!("维度    : {dimension}"),
                    None => println!("维度    : -"),
                }
                println!("片段数量: {}", info.count);
            }
            None => println!("实体 {entity} 不存在，请先运行 setup"),
        }
        Ok(())
    }
}
