//! Simple sequential workflow example.

use tsunagi::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let output = Workflow::start("initial".to_string(), |flow| async move {
        flow.then_step(seed(["sample", "data"]))
            .await
            .then(|_ctx, input| async move {
                println!("Loading {input}...");
                Ok(format!("loaded: {input}"))
            })
            .await
            .end::<String>()
    })
    .await?;

    println!("Workflow completed successfully: {output}");
    Ok(())
}
