use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use indicatif::ProgressBar;
use log::info;
use regex::Regex;
use tasks::*;

mod tasks;
mod types;

use crate::cli::{SubCommandExtend, open_store};
use crate::config::{IdSource, Opts};
use crate::extractor::FeatureExtractor;
use crate::utils::{pb_style, suffix_regex};

#[derive(Parser, Debug, Clone)]
pub struct AddCommand {
    /// 片段所在目录：子目录中的帧构成一个片段，目录下直接存放的图片各自构成一个片段
    pub path: PathBuf,
    /// 扫描的文件后缀名，多个后缀用逗号分隔
    #[arg(short, long, default_value = "jpg,png,webp")]
    pub suffix: String,
    /// 将整个目录作为一个片段
    #[arg(long)]
    pub shot: bool,
    /// 片段 ID 的生成方式
    #[arg(long, value_enum, default_value_t = IdSource::Path)]
    pub id: IdSource,
    /// 在写入数据库之前使用正则表达式对片段路径进行处理
    /// 例：--replace '/path/to/shots/(?<name>[0-9]+)' '$name'
    #[arg(short, long, num_args = 2, value_names = ["REGEX", "REPLACE"], verbatim_doc_comment)]
    pub replace: Vec<String>,
}

impl SubCommandExtend for AddCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let re_suf = suffix_regex(&self.suffix)?;
        let replace = match self.replace.as_slice() {
            [re, rep] => Some((Regex::new(re)?, rep.clone())),
            _ => None,
        };

        let store = open_store(opts).await?;
        let mut extractor = FeatureExtractor::new(opts.transform()).with_entity(opts.entity());
        extractor.init(&store).await?;

        let pb = ProgressBar::no_length().with_style(pb_style());

        let (t1, rx) = task_scan(self.path.clone(), pb.clone(), re_suf, self.shot);
        let (t2, rx) = task_load(rx, pb.clone(), self.id, replace);
        let t3 = task_add(rx, pb.clone(), extractor);

        let (_, _, summary) = tokio::try_join!(t1, t2, t3)?;

        pb.finish_with_message("片段添加完成");
        info!("{summary}");

        Ok(())
    }
}
