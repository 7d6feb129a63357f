//! Refresh operations
//!
//! Each builder returns the refresh id (the cache key it populates) and a
//! re-invocable operation that fetches from the collaborator and writes the
//! result back into the owning cache.

use std::sync::Arc;

use crate::coordinator::CacheCoordinator;
use crate::domain::keys;
use crate::models::FeedType;
use crate::refresh::{operation, RefreshOperation};

pub(super) fn profile(coordinator: &CacheCoordinator, user_id: &str) -> (String, RefreshOperation) {
    let service = Arc::clone(&coordinator.services.profiles);
    let cache = coordinator.social.clone();
    let owned = user_id.to_string();
    let op = operation(move || {
        let (service, cache, user_id) = (Arc::clone(&service), cache.clone(), owned.clone());
        async move {
            let profile = service.fetch_profile(&user_id).await?;
            cache.set_profile(profile);
            Ok(())
        }
    });
    (keys::profile(user_id), op)
}

pub(super) fn follower_count(
    coordinator: &CacheCoordinator,
    user_id: &str,
) -> (String, RefreshOperation) {
    let service = Arc::clone(&coordinator.services.social);
    let cache = coordinator.social.clone();
    let owned = user_id.to_string();
    let op = operation(move || {
        let (service, cache, user_id) = (Arc::clone(&service), cache.clone(), owned.clone());
        async move {
            let count = service.get_follower_count(&user_id).await?;
            cache.set_follower_count(&user_id, count);
            Ok(())
        }
    });
    (keys::follower_count(user_id), op)
}

pub(super) fn following_count(
    coordinator: &CacheCoordinator,
    user_id: &str,
) -> (String, RefreshOperation) {
    let service = Arc::clone(&coordinator.services.social);
    let cache = coordinator.social.clone();
    let owned = user_id.to_string();
    let op = operation(move || {
        let (service, cache, user_id) = (Arc::clone(&service), cache.clone(), owned.clone());
        async move {
            let count = service.get_following_count(&user_id).await?;
            cache.set_following_count(&user_id, count);
            Ok(())
        }
    });
    (keys::following_count(user_id), op)
}

pub(super) fn followers(
    coordinator: &CacheCoordinator,
    user_id: &str,
    page: u32,
) -> (String, RefreshOperation) {
    let service = Arc::clone(&coordinator.services.social);
    let cache = coordinator.social.clone();
    let owned = user_id.to_string();
    let op = operation(move || {
        let (service, cache, user_id) = (Arc::clone(&service), cache.clone(), owned.clone());
        async move {
            let list = service.get_followers(&user_id, page).await?;
            cache.set_followers(&user_id, page, list);
            Ok(())
        }
    });
    (keys::followers(user_id, page), op)
}

pub(super) fn following(
    coordinator: &CacheCoordinator,
    user_id: &str,
    page: u32,
) -> (String, RefreshOperation) {
    let service = Arc::clone(&coordinator.services.social);
    let cache = coordinator.social.clone();
    let owned = user_id.to_string();
    let op = operation(move || {
        let (service, cache, user_id) = (Arc::clone(&service), cache.clone(), owned.clone());
        async move {
            let list = service.get_following(&user_id, page).await?;
            cache.set_following(&user_id, page, list);
            Ok(())
        }
    });
    (keys::following(user_id, page), op)
}

pub(super) fn relationship(
    coordinator: &CacheCoordinator,
    from_id: &str,
    to_id: &str,
) -> (String, RefreshOperation) {
    let service = Arc::clone(&coordinator.services.social);
    let cache = coordinator.social.clone();
    let (from, to) = (from_id.to_string(), to_id.to_string());
    let op = operation(move || {
        let (service, cache) = (Arc::clone(&service), cache.clone());
        let (from_id, to_id) = (from.clone(), to.clone());
        async move {
            let status = service.get_relationship(&from_id, &to_id).await?;
            cache.set_relationship(&from_id, &to_id, status);
            Ok(())
        }
    });
    (keys::relationship(from_id, to_id), op)
}

pub(super) fn search(coordinator: &CacheCoordinator, query: &str) -> (String, RefreshOperation) {
    let service = Arc::clone(&coordinator.services.search);
    let cache = coordinator.social.clone();
    let owned = query.to_string();
    let op = operation(move || {
        let (service, cache, query) = (Arc::clone(&service), cache.clone(), owned.clone());
        async move {
            let results = service.search_users(&query).await?;
            cache.set_search_results(&query, results);
            Ok(())
        }
    });
    (keys::search(query), op)
}

pub(super) fn feed_page(
    coordinator: &CacheCoordinator,
    feed_type: FeedType,
    user_id: &str,
    page: u32,
) -> (String, RefreshOperation) {
    let service = Arc::clone(&coordinator.services.feeds);
    let cache = coordinator.feed.clone();
    let owned = user_id.to_string();
    let op = operation(move || {
        let (service, cache, user_id) = (Arc::clone(&service), cache.clone(), owned.clone());
        async move {
            let mut fetched = service.fetch_feed_page(feed_type, &user_id, page).await?;
            // The cache key is the requested page, whatever the backend echoes
            fetched.page_info.page = page;
            cache.set_feed_page(feed_type, &user_id, fetched);
            Ok(())
        }
    });
    (keys::feed_page(feed_type, user_id, page), op)
}
