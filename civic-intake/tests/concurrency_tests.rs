//! Concurrent workflow calls against a file-backed WAL database
//!
//! The in-memory pool has a single connection, so contention between
//! writers only shows up with a real database file and a multi-connection
//! pool.

mod helpers;

use civic_common::{IssueStatus, VoteType};
use civic_intake::types::Actor;
use helpers::*;
use std::sync::Arc;
use tempfile::TempDir;

async fn file_backed_context(dir: &TempDir) -> TestContext {
    let db = civic_common::db::init_database(&dir.path().join("civic.db"))
        .await
        .expect("file-backed database");
    context_on(db, TestOptions::default())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_votes_all_commit() {
    let dir = TempDir::new().unwrap();
    let ctx = file_backed_context(&dir).await;

    let issue = ctx
        .pipeline
        .submit(submission_at(CITY_LAT, CITY_LON, image(3, 0)))
        .await
        .unwrap()
        .issue;

    let voters = 40;
    let handles: Vec<_> = (0..voters)
        .map(|i| {
            let pipeline = Arc::clone(&ctx.pipeline);
            tokio::spawn(async move {
                pipeline
                    .cast_vote(issue.id, &format!("voter-token-{:04}", i), VoteType::Upvote)
                    .await
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().expect("vote should commit under contention");
    }

    let stored = ctx.pipeline.get_issue(issue.id).await.unwrap();
    assert_eq!(stored.upvote_count, voters);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_votes_and_status_updates_interleave() {
    let dir = TempDir::new().unwrap();
    let ctx = file_backed_context(&dir).await;

    let issue = ctx
        .pipeline
        .submit(submission_at(CITY_LAT, CITY_LON, image(3, 0)))
        .await
        .unwrap()
        .issue;

    let mut votes = Vec::new();
    let mut updates = Vec::new();
    for i in 0..20 {
        let pipeline = Arc::clone(&ctx.pipeline);
        votes.push(tokio::spawn(async move {
            pipeline
                .cast_vote(issue.id, &format!("voter-token-{:04}", i), VoteType::Upvote)
                .await
        }));

        let pipeline = Arc::clone(&ctx.pipeline);
        let status = if i % 2 == 0 {
            IssueStatus::InProgress
        } else {
            IssueStatus::Open
        };
        updates.push(tokio::spawn(async move {
            pipeline
                .update_status(&Actor::SuperAdmin, issue.id, status)
                .await
        }));
    }

    for handle in votes {
        handle.await.unwrap().expect("vote should commit under contention");
    }
    for handle in updates {
        handle.await.unwrap().expect("status update should commit under contention");
    }

    let stored = ctx.pipeline.get_issue(issue.id).await.unwrap();
    assert_eq!(stored.upvote_count, 20);
}
