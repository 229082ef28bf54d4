//! Scores a batch of users, each in its own nested workflow.
//!
//! Every user is handled by a sub-workflow running on a snapshot of the
//! outer context, so per-user values never collide in the shared store.

use std::sync::Arc;
use tsunagi::prelude::*;

#[derive(Debug, Clone)]
struct User {
    name: String,
    purchases: u32,
    years_active: u32,
}

#[derive(Debug, Clone)]
struct Weights {
    per_purchase: f64,
    per_year: f64,
}

#[derive(Debug, Clone)]
struct Score(f64);

#[derive(Debug, Clone)]
struct Leaderboard(Vec<(String, f64)>);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let users = vec![
        User {
            name: "alice".to_string(),
            purchases: 12,
            years_active: 3,
        },
        User {
            name: "bob".to_string(),
            purchases: 4,
            years_active: 7,
        },
        User {
            name: "carol".to_string(),
            purchases: 0,
            years_active: 0,
        },
    ];

    let weights = Weights {
        per_purchase: 1.5,
        per_year: 2.0,
    };

    let board = Workflow::start(weights, |flow| async move {
        let mut flow = flow
            .then(|_ctx, _| async move { Ok(Leaderboard(Vec::new())) })
            .await;
        for user in users {
            let name = user.name.clone();
            flow = flow
                .then_step(nested(user, |inner| async move {
                    inner
                        .then(|ctx, user| async move {
                            let weights = ctx.get::<Weights>()?;
                            if user.years_active == 0 && user.purchases == 0 {
                                return Err(WorkflowError::step_error(format!(
                                    "{} has no history",
                                    user.name
                                )));
                            }
                            Ok(Score(
                                f64::from(user.purchases) * weights.per_purchase
                                    + f64::from(user.years_active) * weights.per_year,
                            ))
                        })
                        .await
                        .recover(|_ctx, _error| async move { Ok(Score(0.0)) })
                        .await
                }))
                .await
                .then(move |ctx: Arc<Context>, score| async move {
                    let mut board = ctx.get::<Leaderboard>()?;
                    board.0.push((name, score.0));
                    Ok(board)
                })
                .await;
        }
        flow.end::<Leaderboard>()
    })
    .await?;

    for (name, score) in board.0 {
        println!("{name:>8}: {score:.1}");
    }
    Ok(())
}
