use anyhow::Result;
use clap::Parser;

use crate::cli::{SubCommandExtend, open_store};
use crate::config::{Opts, OutputFormat, QueryOptions};
use crate::retriever::FeatureRetriever;
use crate::utils::print_result;

#[derive(Parser, Debug, Clone)]
pub struct SimilarCommand {
    #[command(flatten)]
    pub query: QueryOptions,
    /// 已入库片段的 ID
    pub id: String,
    /// 输出格式
    #[arg(long, value_enum, value_name = "FORMAT", default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for SimilarCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let store = open_store(opts).await?;
        let mut retriever = FeatureRetriever::new(opts.transform(), self.query.retriever_config())
            .with_entity(opts.entity());
        retriever.init(&store).await?;
        let result = retriever.get_similar_by_id(&self.id, &self.query.query_config()).await;
        retriever.finish();

        print_result(&result?, self.output_format)
    }
}
