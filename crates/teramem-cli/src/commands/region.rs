//! Persistent region promotion command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Color};
use serde::Serialize;
use teramem_common::config::MemoryConfig;
use teramem_common::types::ObjectRef;
use teramem_common::utils::bytes::format_bytes;
use teramem_engine::MemoryRuntime;

use crate::OutputFormat;
use crate::output::{self, Format};

/// Arguments of the region command.
pub struct RegionArgs {
    pub path: PathBuf,
    pub size: u64,
    pub region_size: Option<u64>,
    pub object: usize,
    pub count: usize,
}

/// Outcome of one promotion.
#[derive(Serialize)]
struct PromotionOutput {
    index: usize,
    /// Offset from the start of the space.
    offset: Option<usize>,
    error: Option<String>,
}

/// Region command report.
#[derive(Serialize)]
struct RegionOutput {
    path: String,
    space_size: usize,
    region_size: usize,
    alignment: usize,
    regions_opened: usize,
    objects_promoted: u64,
    bytes_promoted: u64,
    roots_drained: usize,
    promotions: Vec<PromotionOutput>,
}

impl RegionArgs {
    fn config(&self) -> MemoryConfig {
        let config = MemoryConfig::default().with_persistent(self.size, &self.path);
        match self.region_size {
            Some(region_size) => config.with_region_size(region_size),
            None => config,
        }
    }
}

/// Run the region command.
///
/// Promotes `count` reachable objects, stopping at the first failure, then
/// drains the root stack the way a reachability pass would.
pub fn run(args: &RegionArgs, format: OutputFormat, quiet: bool) -> Result<()> {
    let runtime = MemoryRuntime::start(args.config())?;
    let (space_start, alignment) = runtime
        .with_tera(|tera| (tera.space_start(), tera.alignment()))
        .unwrap_or((0, 0));

    let mut promotions = Vec::with_capacity(args.count);
    for index in 0..args.count {
        // Synthetic source addresses; only their identity matters here.
        let source = ObjectRef::from_addr((index + 1) * 8);
        let payload = vec![(index % 251) as u8; args.object];
        match runtime.promote(source, &payload, true) {
            Ok(addr) => promotions.push(PromotionOutput {
                index,
                offset: Some(addr.addr() - space_start),
                error: None,
            }),
            Err(e) => {
                promotions.push(PromotionOutput {
                    index,
                    offset: None,
                    error: Some(e.to_string()),
                });
                break;
            }
        }
    }
    runtime.flush()?;

    let roots_drained = runtime
        .with_tera(|tera| tera.drain_roots().count())
        .unwrap_or(0);
    let stats = runtime
        .stats()
        .tera
        .ok_or_else(|| anyhow::anyhow!("persistent space was not opened"))?;

    let report = RegionOutput {
        path: args.path.display().to_string(),
        space_size: stats.space_size,
        region_size: stats.region_size,
        alignment,
        regions_opened: stats.regions_opened,
        objects_promoted: stats.objects_promoted,
        bytes_promoted: stats.bytes_promoted,
        roots_drained,
        promotions,
    };

    match Format::from(format) {
        Format::Json => output::print_json(&report, quiet)?,
        Format::Table => {
            if quiet {
                return Ok(());
            }
            let mut table = output::create_table();
            output::add_header(&mut table, &["Object", "Offset", "Outcome"]);
            for p in &report.promotions {
                let outcome = match &p.error {
                    Some(e) => Cell::new(e).fg(Color::Red),
                    None => Cell::new("promoted").fg(Color::Green),
                };
                table.add_row(vec![
                    Cell::new(p.index),
                    Cell::new(p.offset.map_or_else(|| "-".to_string(), |o| o.to_string())),
                    outcome,
                ]);
            }
            println!("{table}");

            let items = vec![
                ("Path", report.path.clone()),
                ("Space Size", format_bytes(report.space_size as u64)),
                ("Region Size", format_bytes(report.region_size as u64)),
                ("Alignment", report.alignment.to_string()),
                ("Regions Opened", report.regions_opened.to_string()),
                ("Objects Promoted", report.objects_promoted.to_string()),
                ("Bytes Promoted", format_bytes(report.bytes_promoted)),
                ("Roots Drained", report.roots_drained.to_string()),
            ];
            output::print_key_value_table(&items, quiet);
            output::success(
                &format!("Flushed {} to disk", args.path.display()),
                quiet,
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_region_run_writes_backing_file() {
        let dir = tempdir().unwrap();
        let args = RegionArgs {
            path: dir.path().join("pmem.img"),
            size: 4096,
            region_size: Some(1024),
            object: 100,
            count: 5,
        };
        run(&args, OutputFormat::Json, true).unwrap();

        let contents = std::fs::read(&args.path).unwrap();
        assert_eq!(contents.len(), 4096);
        assert!(contents[..100].iter().all(|&b| b == 0));
        assert!(contents[104..204].iter().all(|&b| b == 1));
    }

    #[test]
    fn test_region_run_stops_at_space_exhaustion() {
        let dir = tempdir().unwrap();
        let args = RegionArgs {
            path: dir.path().join("pmem.img"),
            size: 2048,
            region_size: Some(1024),
            object: 1000,
            count: 10,
        };
        assert!(run(&args, OutputFormat::Table, true).is_ok());
    }

    #[test]
    fn test_zero_size_is_rejected() {
        let dir = tempdir().unwrap();
        let args = RegionArgs {
            path: dir.path().join("pmem.img"),
            size: 0,
            region_size: None,
            object: 8,
            count: 1,
        };
        assert!(run(&args, OutputFormat::Json, true).is_err());
    }
}
