use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use sysinfo::{Disks, System, MINIMUM_CPU_UPDATE_INTERVAL};

pub const EMPTY_NOTE: &str = "(empty)";
pub const UNREADABLE_NOTE: &str = "(unreadable)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteEntry {
    pub file_name: String,
    pub preview: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotesListing {
    Missing(PathBuf),
    Entries(Vec<NoteEntry>),
}

/// Most recently modified files first, each with its first non-blank line.
pub fn recent_notes(dir: &Path, limit: usize) -> NotesListing {
    let Ok(read_dir) = fs::read_dir(dir) else {
        return NotesListing::Missing(dir.to_path_buf());
    };
    let mut files = read_dir
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().map(|kind| kind.is_file()).unwrap_or(false))
        .map(|entry| {
            let modified = entry
                .metadata()
                .and_then(|meta| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, entry.path())
        })
        .collect::<Vec<_>>();
    files.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    NotesListing::Entries(
        files
            .into_iter()
            .take(limit)
            .map(|(_, path)| NoteEntry {
                file_name: path
                    .file_name()
                    .map(|name| name.to_string_lossy().to_string())
                    .unwrap_or_default(),
                preview: note_preview(&path),
            })
            .collect(),
    )
}

fn note_preview(path: &Path) -> String {
    match fs::read(path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes)
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or(EMPTY_NOTE)
            .to_string(),
        Err(_) => UNREADABLE_NOTE.to_string(),
    }
}

pub fn memory_panel_lines(listing: &NotesListing) -> Vec<String> {
    match listing {
        NotesListing::Missing(dir) => vec![format!("Notes directory not found: {}", dir.display())],
        NotesListing::Entries(entries) if entries.is_empty() => {
            vec!["No notes yet.".to_string()]
        }
        NotesListing::Entries(entries) => std::iter::once("Recent updates".to_string())
            .chain(entries.iter().flat_map(|entry| {
                [entry.file_name.clone(), format!("  {}", entry.preview)]
            }))
            .collect(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsageSample {
    pub used: u64,
    pub total: u64,
}

impl UsageSample {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.used as f64 * 100.0 / self.total as f64
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthSnapshot {
    pub cpu_percent: f32,
    pub memory: UsageSample,
    pub disk: Option<UsageSample>,
}

/// Blocks for the CPU sampling interval; call from a worker thread.
pub fn health_snapshot() -> HealthSnapshot {
    let mut system = System::new();
    system.refresh_cpu_usage();
    std::thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL);
    system.refresh_cpu_usage();
    system.refresh_memory();

    let disks = Disks::new_with_refreshed_list();
    let disk = disks
        .iter()
        .find(|disk| disk.mount_point() == Path::new("/"))
        .map(|disk| UsageSample {
            used: disk.total_space().saturating_sub(disk.available_space()),
            total: disk.total_space(),
        });

    HealthSnapshot {
        cpu_percent: system.global_cpu_usage(),
        memory: UsageSample {
            used: system.used_memory(),
            total: system.total_memory(),
        },
        disk,
    }
}

pub fn health_panel_lines(snapshot: &HealthSnapshot) -> Vec<String> {
    let usage = |sample: &UsageSample| {
        format!(
            "{:.1}% ({} / {})",
            sample.percent(),
            format_bytes(sample.used),
            format_bytes(sample.total)
        )
    };
    vec![
        format!("CPU: {:.1}%", snapshot.cpu_percent),
        format!("Memory: {}", usage(&snapshot.memory)),
        format!(
            "Disk: {}",
            snapshot
                .disk
                .as_ref()
                .map_or_else(|| "unavailable".to_string(), usage)
        ),
    ]
}

pub fn format_bytes(value: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];
    let mut size = value as f64;
    for unit in UNITS {
        if size < 1024.0 {
            return format!("{size:.1} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.1} EB")
}
