use anyhow::Result;
use devenv_recipe::ImageReference;

pub fn handle_image(reference: &str) -> Result<()> {
    let image = ImageReference::parse(reference)?;
    println!("{}", serde_json::to_string_pretty(&image)?);
    Ok(())
}
