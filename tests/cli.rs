use std::path::Path;
use std::process::Command;

use anyhow::Result;
use assert_cmd::prelude::*;
use assert_fs::TempDir;
use image::{Rgba, RgbaImage};
use predicates::prelude::*;
use rstest::*;

macro_rules! cargo_run {
    ($cmd:expr, $($args:expr),*) => {
        {
            let mut cmd = Command::cargo_bin($cmd)?;
            $(cmd.arg($args);)*
            cmd.assert()
        }
    };
}

fn write_frame(path: &Path, color: [u8; 4]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    RgbaImage::from_pixel(8, 8, Rgba(color)).save(path)?;
    Ok(())
}

/// 数据集：两个单帧片段和一个三帧片段
fn dataset(dir: &Path) -> Result<()> {
    write_frame(&dir.join("red.png"), [220, 30, 30, 255])?;
    write_frame(&dir.join("blue.png"), [30, 30, 220, 255])?;
    write_frame(&dir.join("shot_green/0001.png"), [30, 220, 30, 255])?;
    write_frame(&dir.join("shot_green/0002.png"), [30, 200, 30, 255])?;
    write_frame(&dir.join("shot_green/0003.png"), [220, 30, 30, 255])?;
    Ok(())
}

#[test]
fn add_and_search() -> Result<()> {
    let conf_dir = TempDir::new()?;
    let data_dir = TempDir::new()?;
    dataset(data_dir.path())?;

    cargo_run!("shotsearch", "-c", conf_dir.path(), "setup").success();
    cargo_run!("shotsearch", "-c", conf_dir.path(), "add", data_dir.path()).success();

    let red = data_dir.path().join("red.png");
    let output = cargo_run!("shotsearch", "-c", conf_dir.path(), "search", &red, "--count", "1")
        .success()
        .get_output()
        .stdout
        .clone();
    let output = String::from_utf8(output)?;
    assert_eq!(output.lines().count(), 1);
    assert!(output.contains(red.to_str().unwrap()));

    let shot = data_dir.path().join("shot_green");
    cargo_run!("shotsearch", "-c", conf_dir.path(), "similar", shot.to_str().unwrap())
        .success()
        .stdout(predicate::str::starts_with("1.0000"))
        .stdout(predicate::str::contains(shot.to_str().unwrap()));

    cargo_run!("shotsearch", "-c", conf_dir.path(), "show")
        .success()
        .stdout(predicate::str::contains("3"));

    Ok(())
}

#[test]
fn add_is_idempotent() -> Result<()> {
    let conf_dir = TempDir::new()?;
    let data_dir = TempDir::new()?;
    dataset(data_dir.path())?;

    cargo_run!("shotsearch", "-c", conf_dir.path(), "setup").success();
    cargo_run!("shotsearch", "-c", conf_dir.path(), "add", data_dir.path()).success();
    cargo_run!("shotsearch", "-c", conf_dir.path(), "add", data_dir.path())
        .success()
        .stderr(predicate::str::contains("写入 0，跳过 3，失败 0"));

    Ok(())
}

#[rstest]
#[case::json("json", "\"score\"")]
#[case::table("table", "\t")]
fn output_format(#[case] format: &str, #[case] expected: &str) -> Result<()> {
    let conf_dir = TempDir::new()?;
    let data_dir = TempDir::new()?;
    dataset(data_dir.path())?;

    cargo_run!("shotsearch", "-c", conf_dir.path(), "setup").success();
    cargo_run!("shotsearch", "-c", conf_dir.path(), "add", data_dir.path(), "--id", "blake3")
        .success();

    cargo_run!(
        "shotsearch",
        "-c",
        conf_dir.path(),
        "search",
        data_dir.path().join("blue.png"),
        "--output-format",
        format
    )
    .success()
    .stdout(predicate::str::contains(expected));

    Ok(())
}

#[test]
fn unknown_id_is_empty() -> Result<()> {
    let conf_dir = TempDir::new()?;

    cargo_run!("shotsearch", "-c", conf_dir.path(), "setup").success();
    cargo_run!("shotsearch", "-c", conf_dir.path(), "similar", "missing")
        .success()
        .stdout(predicate::str::is_empty());

    Ok(())
}

#[test]
fn export_features() -> Result<()> {
    let conf_dir = TempDir::new()?;
    let data_dir = TempDir::new()?;
    dataset(data_dir.path())?;
    let output = conf_dir.path().join("features.npy");

    cargo_run!("shotsearch", "-c", conf_dir.path(), "setup").success();
    cargo_run!("shotsearch", "-c", conf_dir.path(), "add", data_dir.path()).success();
    cargo_run!("shotsearch", "-c", conf_dir.path(), "export", "--output", &output).success();

    assert!(output.exists());
    let ids = std::fs::read_to_string(conf_dir.path().join("features.npy.ids"))?;
    assert_eq!(ids.lines().count(), 3);

    Ok(())
}

#[test]
fn drop_entity() -> Result<()> {
    let conf_dir = TempDir::new()?;

    cargo_run!("shotsearch", "-c", conf_dir.path(), "setup").success();
    cargo_run!("shotsearch", "-c", conf_dir.path(), "drop").success();
    cargo_run!("shotsearch", "-c", conf_dir.path(), "show")
        .success()
        .stdout(predicate::str::contains("不存在"));

    Ok(())
}
