//! Sample data generation
//!
//! Fills an empty store with users, posts, comments and follow edges for
//! local development. A fixed RNG seed reproduces the same data set.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::Storage;
use crate::config::SeedConfig;
use crate::data::{
    CommentRepository, FollowerRepository, NewComment, NewPost, NewUser, PasswordHash,
    PostRepository, UserRepository,
};
use crate::error::StoreError;

const SEED_PASSWORD: &str = "password";

const TITLES: &[&str] = &[
    "Why ownership finally clicked",
    "A week with SQLite in production",
    "Notes from the async book club",
    "Ten tips for faster builds",
    "How we test database code",
    "The case for boring technology",
    "Debugging a deadlock",
    "Small tools, sharp edges",
    "What I learned shipping a CLI",
    "Reading query plans",
];

const CONTENTS: &[&str] = &[
    "Turns out the borrow checker was right all along.",
    "WAL mode and a sensible busy timeout go a long way.",
    "We finally understood pinning after drawing it out.",
    "Caching dependencies cut our CI time in half.",
    "Temporary databases per test keep everything isolated.",
    "Fewer moving parts means fewer pages at night.",
    "Two locks, opposite order. A classic.",
    "Most problems do not need a framework.",
    "Argument parsing is the easy part; error messages are not.",
    "EXPLAIN QUERY PLAN is your friend.",
];

const COMMENTS: &[&str] = &[
    "Great write-up!",
    "I ran into the same thing last month.",
    "Do you have benchmarks for this?",
    "Bookmarked, thanks.",
    "Strongly disagree, but well argued.",
    "This saved me an afternoon.",
];

const TAGS: &[&str] = &["rust", "go", "sql", "async", "testing", "tooling", "ops"];

/// What a seeding run created
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub users: usize,
    pub posts: usize,
    pub comments: usize,
    pub follows: usize,
}

/// Populate `storage` according to `config`
///
/// Users that already exist are reused, so rerunning adds content without
/// failing on identity constraints.
pub async fn run(storage: &Storage, config: &SeedConfig) -> Result<SeedReport, StoreError> {
    let mut rng = StdRng::seed_from_u64(config.rng_seed);
    let mut report = SeedReport::default();

    let password = PasswordHash::hash_blocking(SEED_PASSWORD.to_string()).await?;
    let mut user_ids = Vec::with_capacity(config.users);

    for i in 0..config.users {
        let user = NewUser {
            username: format!("user{i}"),
            email: format!("user{i}@example.com"),
            password: password.clone(),
        };
        let email = user.email.clone();

        match storage.users.create(user).await {
            Ok(created) => {
                report.users += 1;
                user_ids.push(created.id);
            }
            Err(StoreError::DuplicateEmail | StoreError::DuplicateUsername) => {
                user_ids.push(storage.users.get_by_email(&email).await?.id);
            }
            Err(error) => return Err(error),
        }
    }

    if user_ids.is_empty() {
        return Ok(report);
    }

    let mut post_ids = Vec::with_capacity(config.posts);
    for _ in 0..config.posts {
        let tag_count = rng.gen_range(0..=3);
        let post = NewPost {
            user_id: pick(&user_ids, &mut rng),
            title: pick(TITLES, &mut rng).to_string(),
            content: pick(CONTENTS, &mut rng).to_string(),
            tags: TAGS
                .choose_multiple(&mut rng, tag_count)
                .map(|tag| tag.to_string())
                .collect(),
        };

        post_ids.push(storage.posts.create(post).await?.id);
        report.posts += 1;
    }

    if !post_ids.is_empty() {
        for _ in 0..config.comments {
            let comment = NewComment {
                post_id: pick(&post_ids, &mut rng),
                user_id: pick(&user_ids, &mut rng),
                content: pick(COMMENTS, &mut rng).to_string(),
            };

            storage.comments.create(comment).await?;
            report.comments += 1;
        }
    }

    for _ in 0..config.follows {
        let follower_id = pick(&user_ids, &mut rng);
        let user_id = pick(&user_ids, &mut rng);

        match storage.followers.follow(follower_id, user_id).await {
            Ok(()) => report.follows += 1,
            Err(StoreError::Conflict | StoreError::SelfFollow) => {}
            Err(error) => return Err(error),
        }
    }

    tracing::info!(
        users = report.users,
        posts = report.posts,
        comments = report.comments,
        follows = report.follows,
        "Seeding complete"
    );
    Ok(report)
}

fn pick<T: Copy>(items: &[T], rng: &mut StdRng) -> T {
    items[rng.gen_range(0..items.len())]
}
