use clap::Parser;
use mailbag_pst::Pst;

mod args;

fn main() -> anyhow::Result<()> {
    let args = args::Args::try_parse()?;

    let pst = Pst::read(&args.file)?;
    println!(
        "{:?}, encryption {}",
        pst.header().version,
        pst.encryption_type()
    );
    println!(
        "{} index records, {} descriptors",
        pst.index().len(),
        pst.descriptors().len()
    );

    pst.walk(|depth, item| {
        let label = item
            .display_name()
            .or_else(|| item.message_class())
            .unwrap_or("(unnamed)");
        println!(
            "{:indent$}[{:?}] 0x{:X} {label}",
            "",
            item.kind,
            item.desc_id,
            indent = depth * 2,
        );
    });

    for warning in pst.warnings() {
        eprintln!("{warning}");
    }

    Ok(())
}
