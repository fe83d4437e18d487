// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

#[cfg(test)]
mod tests {
    use crate::integration::helpers::MockRenderer;
    use snaprs::engines::traits::{Renderer, SessionOptions};
    use snaprs::workers::session_registry::{SessionGuard, SessionRegistry};
    use std::time::Duration;

    fn options() -> SessionOptions {
        SessionOptions { headless: true }
    }

    #[tokio::test]
    async fn test_close_all_tolerates_double_close() {
        let renderer = MockRenderer::new();
        let registry = SessionRegistry::new();

        let first = renderer.open_session(&options()).await.unwrap();
        let second = renderer.open_session(&options()).await.unwrap();
        registry.register(first.clone());
        registry.register(second.clone());

        first.close().await;
        assert_eq!(registry.close_all().await, 2);
        assert!(registry.is_empty());
        assert!(second.is_closed());
        assert_eq!(renderer.sessions_closed(), 2);

        assert_eq!(registry.close_all().await, 0);
    }

    #[tokio::test]
    async fn test_guard_release_closes_once() {
        let renderer = MockRenderer::new();
        let registry = SessionRegistry::new();
        let session = renderer.open_session(&options()).await.unwrap();

        let guard = SessionGuard::new(session.clone(), registry.clone());
        assert_eq!(registry.len(), 1);

        registry.close_all().await;
        guard.release().await;

        assert!(session.is_closed());
        assert!(registry.is_empty());
        assert_eq!(renderer.sessions_closed(), 1);
    }

    #[tokio::test]
    async fn test_dropped_guard_closes_in_background() {
        let renderer = MockRenderer::new();
        let registry = SessionRegistry::new();
        let session = renderer.open_session(&options()).await.unwrap();

        drop(SessionGuard::new(session.clone(), registry.clone()));
        assert!(registry.is_empty());

        for _ in 0..100 {
            if session.is_closed() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(session.is_closed());
    }
}
