//! Merchant command implementation

use anyhow::Result;
use recur_core::extract_merchant;

pub fn cmd_merchant(description: &str) -> Result<()> {
    let merchant = extract_merchant(description);
    if merchant.is_empty() {
        println!("(no merchant key)");
    } else {
        println!("{}", merchant);
    }
    Ok(())
}
