use cucumber::{gherkin::Step, given};
use zelle_payment_engine::{db_types::NewPayee, PayeeManagement};
use zpg_common::Cents;

use crate::cucumber::{world::ReconciliationSystem, ZelleWorld};

#[given("a fresh install")]
async fn fresh_database(world: &mut ZelleWorld) {
    let system = ReconciliationSystem::new().await;
    world.system = Some(system);
}

#[given("these payees")]
async fn payees(world: &mut ZelleWorld, step: &Step) {
    let table = step.table.as_ref().expect("Payee table is missing");
    // columns: id | name | email | balance_due
    for row in table.rows.iter().skip(1) {
        let mut payee = NewPayee::new(row[0].as_str(), row[1].as_str());
        if !row[2].trim().is_empty() {
            payee = payee.with_contact_address(row[2].trim());
        }
        let balance: Cents = row[3].parse().expect("Invalid balance");
        payee = payee.with_balance_due(balance);
        world.db().upsert_payee(payee).await.expect("Error creating payee");
    }
}
