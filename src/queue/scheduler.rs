// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::capture_record::{Batch, Target};

/// 把目标按轮询方式分配到 `worker_count` 个批次
///
/// 第 `i` 个批次拿到下标为 `i, i+W, i+2W, ...` 的目标，批次大小相差不超过1。
/// 空批次不返回，所以目标少于工作器时批次数等于目标数。
pub fn partition(targets: &[Target], worker_count: usize) -> Vec<Batch> {
    let workers = worker_count.max(1);

    (0..workers)
        .map(|i| {
            let batch: Vec<Target> = targets.iter().skip(i).step_by(workers).cloned().collect();
            Batch::new(i, batch)
        })
        .filter(|batch| !batch.is_empty())
        .collect()
}
