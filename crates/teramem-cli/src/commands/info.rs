//! Memory layout info command.

use anyhow::Result;
use comfy_table::Cell;
use teramem_common::config::MemoryConfig;
use teramem_common::types::PoolCategory;
use teramem_common::utils::bytes::format_bytes;
use teramem_core::memory::MemoryManager;

use crate::OutputFormat;
use crate::output::{self, Format};

/// Run the info command.
///
/// Builds a manager without opening the persistent space, so no backing
/// file is created.
pub fn run(config: &MemoryConfig, format: OutputFormat, quiet: bool) -> Result<()> {
    let manager = MemoryManager::new(config)?;
    let stats = manager.stats();

    match Format::from(format) {
        Format::Json => output::print_json(&stats, quiet)?,
        Format::Table => {
            let items = vec![
                ("Mode", stats.default_mode.to_string()),
                ("Policy", stats.policy.to_string()),
                ("Page Size", format_bytes(stats.page_size)),
                (
                    "Max Storage",
                    format_bytes(manager.max_storage_memory(stats.default_mode)),
                ),
                ("Total Used", format_bytes(stats.total_used())),
            ];
            output::print_key_value_table(&items, quiet);

            if !quiet {
                let mut table = output::create_table();
                output::add_header(
                    &mut table,
                    &["Mode", "Pool", "Capacity", "Used", "Free", "Tasks", "Cached", "Unrolled"],
                );
                for pool in &stats.pools {
                    let tasks = match pool.category {
                        PoolCategory::Execution => {
                            format!("{} ({} waiting)", pool.active_tasks, pool.waiting_tasks)
                        }
                        PoolCategory::Storage => "-".to_string(),
                    };
                    table.add_row(vec![
                        Cell::new(pool.mode),
                        Cell::new(pool.category),
                        Cell::new(format_bytes(pool.pool_size)),
                        Cell::new(format_bytes(pool.memory_used)),
                        Cell::new(format_bytes(pool.memory_free())),
                        Cell::new(tasks),
                        Cell::new(format_bytes(pool.storage_bytes_granted)),
                        Cell::new(format_bytes(pool.unroll_bytes_granted)),
                    ]);
                }
                println!("{table}");
            }
        }
    }

    Ok(())
}
