// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::domain::models::capture_record::CaptureRecord;

/// 结果存储
///
/// 所有工作器共享的只追加集合。每次追加和每次快照都在同一把锁内完成，
/// 因此并发追加不会丢失或重复，快照总是一致的副本。
#[derive(Clone, Default)]
pub struct ResultStore {
    records: Arc<Mutex<Vec<CaptureRecord>>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条记录
    ///
    /// # 返回值
    ///
    /// 追加后的记录总数
    pub fn append(&self, record: CaptureRecord) -> usize {
        let mut records = self.records.lock();
        records.push(record);
        records.len()
    }

    /// 返回按插入顺序排列的一致副本
    pub fn snapshot(&self) -> Vec<CaptureRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
