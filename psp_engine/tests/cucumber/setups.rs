use cucumber::given;

use crate::{
    cucumber::{psp_world::PspSystem, PspWorld},
    support::fixtures::{fixed_package, merchant},
};

#[given("a PSP system")]
async fn fresh_system(world: &mut PspWorld) {
    world.system = Some(PspSystem::new().await);
}

#[given(expr = "the project sells fixed packages in region {word} for {int} {word} and {int} {word}")]
async fn fixed_packages(world: &mut PspWorld, region: String, price1: i64, cur1: String, price2: i64, cur2: String) {
    let packages = vec![
        fixed_package(&format!("fp-{price1}"), &region, price1, &cur1),
        fixed_package(&format!("fp-{price2}"), &region, price2, &cur2),
    ];
    world
        .sys()
        .tables
        .update_project(move |p| {
            p.fixed_packages.insert(region, packages);
        })
        .await;
}

#[given("the merchant charges VAT and shifts commission onto payers")]
async fn vat_and_commission_shift(world: &mut PspWorld) {
    world.sys().tables.update_project(|p| p.merchant = merchant(true, true)).await;
}
