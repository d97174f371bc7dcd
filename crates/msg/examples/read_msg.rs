use clap::Parser;
use mailbag_msg::MsgFile;

mod args;

fn main() -> anyhow::Result<()> {
    let args = args::Args::try_parse()?;

    let msg = MsgFile::read(&args.file)?;
    let message = msg.message();

    println!("Subject: {}", message.subject().unwrap_or("(none)"));
    println!(
        "Class:   {}",
        message.message_class().unwrap_or("(none)")
    );

    for recipient in &message.recipients {
        println!(
            "Recipient ({:?}): {} <{}>",
            recipient.recipient_type,
            recipient.name.as_deref().unwrap_or("?"),
            recipient.email.as_deref().unwrap_or("?"),
        );
    }

    for attachment in &message.attachments {
        println!(
            "Attachment: {} ({} bytes{})",
            attachment.filename,
            attachment.data.as_ref().map(Vec::len).unwrap_or(0),
            if attachment.embedded_message.is_some() {
                ", embedded message"
            } else {
                ""
            },
        );
    }

    for (key, value) in &message.properties {
        println!("{key} = {value:?}");
    }

    for warning in &message.warnings {
        eprintln!("{warning}");
    }

    Ok(())
}
