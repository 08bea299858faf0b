//! E2E tests for posts, follows and the feed

mod common;

use common::TestStore;
use socialstore::config::SeedConfig;
use socialstore::data::{
    CommentRepository, FeedQuery, FeedRepository, FollowerRepository, NewComment, PostRepository,
    SortDirection,
};
use socialstore::error::StoreError;
use socialstore::seed;

#[tokio::test]
async fn test_feed_tag_scenario() {
    let store = TestStore::new().await;
    let a = store.create_user("a").await;
    let b = store.create_user("b").await;

    store.storage.followers.follow(a.id, b.id).await.unwrap();
    let p1 = store.create_post(b.id, "P1", &["go"]).await;
    store.create_post(b.id, "P2", &["rust"]).await;

    let query = FeedQuery {
        tags: vec!["go".to_string()],
        ..Default::default()
    };
    let feed = store.storage.feed.get_user_feed(a.id, &query).await.unwrap();

    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].post, p1);
    assert_eq!(feed[0].username, "b");
    assert_eq!(feed[0].comments_count, 0);
}

#[tokio::test]
async fn test_unfollow_removes_author_from_feed() {
    let store = TestStore::new().await;
    let a = store.create_user("a").await;
    let b = store.create_user("b").await;

    store.storage.followers.follow(a.id, b.id).await.unwrap();
    store.create_post(b.id, "hello", &[]).await;
    assert_eq!(
        store
            .storage
            .feed
            .get_user_feed(a.id, &FeedQuery::default())
            .await
            .unwrap()
            .len(),
        1
    );

    store.storage.followers.unfollow(a.id, b.id).await.unwrap();
    assert!(
        store
            .storage
            .feed
            .get_user_feed(a.id, &FeedQuery::default())
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_concurrent_post_updates_one_winner() {
    let store = TestStore::new().await;
    let author = store.create_user("author").await;
    let post = store.create_post(author.id, "original", &[]).await;

    let mut left = post.clone();
    left.title = "left".to_string();
    let mut right = post.clone();
    right.title = "right".to_string();

    let posts = store.storage.posts.clone();
    let (left, right) = tokio::join!(posts.update(&left), posts.update(&right));

    let outcomes = [left, right];
    let winners: Vec<_> = outcomes.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0].version, 2);
    assert!(
        outcomes
            .iter()
            .any(|r| matches!(r, Err(StoreError::VersionConflict)))
    );

    let stored = store.storage.posts.get_by_id(post.id).await.unwrap();
    assert_eq!(&stored, winners[0]);
}

#[tokio::test]
async fn test_feed_reports_comment_counts_after_comments() {
    let store = TestStore::new().await;
    let a = store.create_user("a").await;
    let post = store.create_post(a.id, "mine", &["rust"]).await;

    for i in 0..2 {
        store
            .storage
            .comments
            .create(NewComment {
                post_id: post.id,
                user_id: a.id,
                content: format!("comment {i}"),
            })
            .await
            .unwrap();
    }

    let feed = store
        .storage
        .feed
        .get_user_feed(a.id, &FeedQuery::default())
        .await
        .unwrap();
    assert_eq!(feed[0].comments_count, 2);
}

#[tokio::test]
async fn test_seed_populates_store() {
    let store = TestStore::new().await;
    let config = SeedConfig {
        enabled: true,
        users: 5,
        posts: 12,
        comments: 20,
        follows: 10,
        rng_seed: 7,
    };

    let report = seed::run(&store.storage, &config).await.unwrap();
    assert_eq!(report.users, 5);
    assert_eq!(report.posts, 12);
    assert_eq!(report.comments, 20);
    assert!(report.follows <= 10);

    // Rerunning reuses the existing users.
    let again = seed::run(&store.storage, &config).await.unwrap();
    assert_eq!(again.users, 0);
    assert_eq!(again.posts, 12);

    let mut total = 0;
    for user_id in 1..=5 {
        let following = store.storage.followers.following(user_id).await.unwrap();
        assert!(!following.contains(&user_id));
        total += following.len();
    }
    assert_eq!(total, report.follows + again.follows);

    let query = FeedQuery {
        sort: SortDirection::Asc,
        limit: 20,
        ..Default::default()
    };
    let feed = store.storage.feed.get_user_feed(1, &query).await.unwrap();
    assert!(feed.windows(2).all(|w| w[0].post.created_at <= w[1].post.created_at));
}
