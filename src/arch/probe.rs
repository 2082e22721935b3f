// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fs;

/// Counts GPU device files on this host.
///
/// NVIDIA devices (`/dev/nvidia0`, `/dev/nvidia1`, ...) win; otherwise DRM render
/// nodes (`/dev/dri/renderD128`, ...) are counted. Missing directories count as zero.
pub(super) fn local_gpu_count() -> usize {
    let nvidia = count_entries("/dev", |name| {
        name.strip_prefix("nvidia")
            .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
    });
    if nvidia > 0 {
        return nvidia;
    }
    count_entries("/dev/dri", |name| name.starts_with("renderD"))
}

fn count_entries(dir: &str, matches: impl Fn(&str) -> bool) -> usize {
    match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_str().is_some_and(&matches))
            .count(),
        Err(_) => 0,
    }
}
