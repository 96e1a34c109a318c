use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;
use log::info;
use ndarray::Array2;
use ndarray_npy::write_npy;

use crate::cli::{SubCommandExtend, open_store};
use crate::config::Opts;
use crate::db::{DbSelector, Store};

#[derive(Parser, Debug, Clone)]
pub struct ExportCommand {
    /// 导出的 npy 文件，片段 ID 会写入同名的 .ids 文件
    #[arg(short, long, default_value = "features.npy")]
    pub output: PathBuf,
}

impl ExportCommand {
    fn ids_path(&self) -> PathBuf {
        let mut path = self.output.clone().into_os_string();
        path.push(".ids");
        PathBuf::from(path)
    }
}

impl SubCommandExtend for ExportCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let store = open_store(opts).await?;
        let mut selector = store.selector().await?;
        selector.open(&opts.entity()).await?;
        let features = selector.all_features().await;
        selector.close();
        let features = features?;

        let dimension = features.first().map(|(_, v)| v.dimension()).unwrap_or(0);
        let mut ids = String::new();
        let mut data = Vec::with_capacity(features.len() * dimension);
        for (id, vector) in &features {
            if vector.dimension() != dimension {
                bail!("片段 {id} 的维度 {} 与 {dimension} 不一致", vector.dimension());
            }
            ids.push_str(id);
            ids.push('\n');
            data.extend_from_slice(vector.as_slice());
        }

        let data = Array2::from_shape_vec((features.len(), dimension), data)?;
        write_npy(&self.output, &data)?;
        tokio::fs::write(self.ids_path(), ids).await?;
        info!("导出成功：{} 个片段，维度 {dimension}", features.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_path() {
        let cmd = ExportCommand { output: PathBuf::from("/tmp/out.npy") };
        assert_eq!(cmd.ids_path(), PathBuf::from("/tmp/out.npy.ids"));
    }
}
