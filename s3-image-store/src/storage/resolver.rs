use crate::error::{ResolutionError, StoreError};
use crate::storage::ObjectStore;
use crate::storage::paths::{StorageKey, with_suffix};

/// Finds a key for `base_name` inside `directory` that is not taken in the
/// store. Tries `name.ext`, then `name-1.ext`, `name-2.ext`, ... until a free
/// key turns up or `max_attempts` candidates were rejected.
///
/// A "not found" answer means the key is free; any other store failure
/// aborts the resolution. The result is only free at the time of the check.
pub async fn resolve_unique_key(
    store: &dyn ObjectStore,
    base_name: &str,
    directory: &str,
    max_attempts: u32,
) -> Result<StorageKey, ResolutionError> {
    for attempt in 0..max_attempts {
        let name = match attempt {
            0 => base_name.to_string(),
            n => with_suffix(base_name, n),
        };
        let candidate = StorageKey::from_parts([directory, name.as_str()]);

        match store.head_object(candidate.as_str()).await {
            Ok(()) => {
                tracing::debug!(key = %candidate, "key already taken, trying next suffix");
            }
            Err(StoreError::NotFound(_)) => return Ok(candidate),
            Err(source) => {
                return Err(ResolutionError::Lookup {
                    key: candidate.into_string(),
                    source,
                });
            }
        }
    }

    Err(ResolutionError::Exhausted {
        name: base_name.to_string(),
        directory: directory.to_string(),
        attempts: max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::driver::memory::MemoryStorage;

    #[tokio::test]
    async fn test_free_key_is_used_as_is() {
        let store = MemoryStorage::new();
        let key = resolve_unique_key(&store, "cat.jpg", "/images/2024/01", 10)
            .await
            .unwrap();
        assert_eq!(key.as_str(), "images/2024/01/cat.jpg");
    }

    #[tokio::test]
    async fn test_skips_seeded_keys() {
        let store = MemoryStorage::new();
        let seeded = ["2024/01/cat.jpg", "2024/01/cat-1.jpg", "2024/01/cat-2.jpg"];
        for key in seeded {
            store.insert(key, "x").await;
        }

        let key = resolve_unique_key(&store, "cat.jpg", "2024/01", 10).await.unwrap();
        assert_eq!(key.as_str(), "2024/01/cat-3.jpg");
        assert!(!seeded.contains(&key.as_str()));
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let store = MemoryStorage::new();
        store.insert("a/cat.jpg", "x").await;
        store.insert("a/cat-1.jpg", "x").await;

        let err = resolve_unique_key(&store, "cat.jpg", "a", 2).await.unwrap_err();
        assert!(matches!(err, ResolutionError::Exhausted { attempts: 2, .. }));
    }

    #[tokio::test]
    async fn test_lookup_failure_is_not_a_collision() {
        let store = MemoryStorage::new();
        store.set_unavailable(true);

        let err = resolve_unique_key(&store, "cat.jpg", "a", 5).await.unwrap_err();
        match err {
            ResolutionError::Lookup { key, source } => {
                assert_eq!(key, "a/cat.jpg");
                assert!(matches!(source, StoreError::Backend { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
