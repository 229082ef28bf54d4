//! Order processing with parallel payment and stock checks.
//!
//! Demonstrates:
//! - Custom steps reading their input from the context
//! - Running two steps side by side with `fork`
//! - Recording failures with `on_failure` and falling back with `recover`
//! - Resolving the final value with `end`

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tsunagi::prelude::*;

#[derive(Debug, Clone)]
struct Order {
    id: String,
    items: Vec<OrderItem>,
    card_number: String,
}

#[derive(Debug, Clone)]
struct OrderItem {
    product_id: String,
    quantity: u32,
    price: f64,
}

#[derive(Debug, Clone)]
struct PaymentStatus {
    transaction_id: String,
    amount: f64,
}

#[derive(Debug, Clone)]
struct StockReservation {
    reserved: u32,
}

#[derive(Debug, Clone)]
struct Confirmation(String);

#[derive(Debug, Clone)]
struct Notifications(Vec<String>);

struct ValidateOrderStep;

#[async_trait]
impl Step for ValidateOrderStep {
    type Output = f64;

    async fn execute(&self, ctx: Arc<Context>) -> Result<f64, WorkflowError> {
        println!("Validating order...");
        let order = ctx.get::<Order>()?;
        if order.items.is_empty() {
            return Err(WorkflowError::step_error("order has no items"));
        }
        Ok(order
            .items
            .iter()
            .map(|item| item.price * f64::from(item.quantity))
            .sum())
    }
}

struct ChargeCardStep;

#[async_trait]
impl Step for ChargeCardStep {
    type Output = PaymentStatus;

    async fn execute(&self, ctx: Arc<Context>) -> Result<PaymentStatus, WorkflowError> {
        let order = ctx.get::<Order>()?;
        let amount = ctx.get::<f64>()?;
        println!("Charging {amount:.2} for {}...", order.id);
        tokio::time::sleep(Duration::from_millis(100)).await;
        if order.card_number.starts_with('0') {
            return Err(WorkflowError::step_error("card declined"));
        }
        Ok(PaymentStatus {
            transaction_id: format!("TX-{}", order.id),
            amount,
        })
    }
}

struct ReserveStockStep;

#[async_trait]
impl Step for ReserveStockStep {
    type Output = StockReservation;

    async fn execute(&self, ctx: Arc<Context>) -> Result<StockReservation, WorkflowError> {
        let order = ctx.get::<Order>()?;
        for item in &order.items {
            println!("Reserving {} x {}", item.quantity, item.product_id);
        }
        Ok(StockReservation {
            reserved: order.items.iter().map(|item| item.quantity).sum(),
        })
    }
}

struct NotifyFailureStep;

#[async_trait]
impl Step for NotifyFailureStep {
    type Output = Notifications;

    async fn execute(&self, ctx: Arc<Context>) -> Result<Notifications, WorkflowError> {
        let mut sent = ctx.find::<Notifications>().map(|n| n.0).unwrap_or_default();
        if let Some(failure) = ctx.current_failure() {
            sent.push(format!("ops alerted: {failure}"));
        }
        Ok(ctx.store(Notifications(sent)))
    }
}

async fn process(order: Order) -> Result<Confirmation, WorkflowError> {
    Workflow::start(order, |flow| async move {
        flow.then_step(ValidateOrderStep)
            .await
            .fork(ChargeCardStep.and(ReserveStockStep))
            .await
            .then(|_ctx, (payment, stock)| async move {
                Ok(Confirmation(format!(
                    "{} charged {:.2} for {} items",
                    payment.transaction_id, payment.amount, stock.reserved
                )))
            })
            .await
            .on_failure(NotifyFailureStep)
            .await
            .recover(|ctx, error| async move {
                let order = ctx.get::<Order>()?;
                Ok(Confirmation(format!("order {} on hold: {error}", order.id)))
            })
            .await
    })
    .await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let items = vec![
        OrderItem {
            product_id: "PROD-1".to_string(),
            quantity: 2,
            price: 29.99,
        },
        OrderItem {
            product_id: "PROD-2".to_string(),
            quantity: 1,
            price: 49.99,
        },
    ];

    let good = Order {
        id: "ORD-001".to_string(),
        items: items.clone(),
        card_number: "4111111111111111".to_string(),
    };
    let declined = Order {
        id: "ORD-002".to_string(),
        items,
        card_number: "0000000000000000".to_string(),
    };

    for order in [good, declined] {
        let confirmation = process(order).await?;
        println!("{}", confirmation.0);
    }

    Ok(())
}
