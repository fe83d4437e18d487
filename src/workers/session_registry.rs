// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::engines::traits::RenderSession;

/// 活跃渲染会话登记表
///
/// 会话由创建它的工作器独占；登记表只用于编排器的强制回收。
/// 会话的 `close` 是幂等的，所以强制回收和工作器自身的释放可以同时发生。
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<Uuid, Arc<dyn RenderSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, session: Arc<dyn RenderSession>) {
        self.sessions.insert(session.id(), session);
    }

    pub fn deregister(&self, id: Uuid) {
        self.sessions.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// 强制关闭所有已登记的会话
    ///
    /// # 返回值
    ///
    /// 被关闭的会话数量
    pub async fn close_all(&self) -> usize {
        let ids: Vec<Uuid> = self.sessions.iter().map(|entry| *entry.key()).collect();
        let drained: Vec<Arc<dyn RenderSession>> = ids
            .into_iter()
            .filter_map(|id| self.sessions.remove(&id).map(|(_, session)| session))
            .collect();

        if drained.is_empty() {
            return 0;
        }

        info!("Closing {} active browser session(s)...", drained.len());
        futures::future::join_all(drained.iter().map(|session| session.close())).await;
        info!("All browser sessions closed");
        drained.len()
    }
}

/// 会话作用域守卫
///
/// 创建时登记会话，`release` 时注销并关闭。若守卫在未释放时被丢弃
/// （例如任务被中止），会在后台关闭会话，保证任何退出路径都不泄漏。
pub struct SessionGuard {
    session: Arc<dyn RenderSession>,
    registry: SessionRegistry,
    released: bool,
}

impl SessionGuard {
    pub fn new(session: Arc<dyn RenderSession>, registry: SessionRegistry) -> Self {
        registry.register(session.clone());
        Self {
            session,
            registry,
            released: false,
        }
    }

    pub fn session(&self) -> &dyn RenderSession {
        self.session.as_ref()
    }

    /// 注销并关闭会话，只执行一次
    pub async fn release(mut self) {
        self.released = true;
        self.registry.deregister(self.session.id());
        self.session.close().await;
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.registry.deregister(self.session.id());

        let session = self.session.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            debug!(session = %session.id(), "Session guard dropped without release, closing in background");
            handle.spawn(async move {
                session.close().await;
            });
        }
    }
}
