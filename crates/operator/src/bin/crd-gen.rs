//! Emits the multi-version MySQL CRD without webhook wiring.
use mysql_operator::crd::merged_crd;

fn main() -> anyhow::Result<()> {
    let crd = merged_crd(None)?;
    println!("{}", serde_yaml::to_string(&crd)?);
    Ok(())
}
