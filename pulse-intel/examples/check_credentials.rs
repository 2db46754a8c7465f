use pulse_intel::{GeminiClient, GeminiConfig};

fn main() {
    println!("Checking provider credential...\n");

    let api_key = std::env::var("GEMINI_API_KEY")
        .or_else(|_| std::env::var("API_KEY"))
        .ok();

    print!("GeminiClient::new() - ");
    match GeminiClient::new(GeminiConfig {
        api_key,
        ..GeminiConfig::default()
    }) {
        Ok(client) if client.has_credential() => {
            println!("SUCCESS (credential set, model {})", client.model())
        }
        Ok(_) => println!("NO CREDENTIAL (refresh cycles will fail with API_KEY_MISSING)"),
        Err(e) => println!("ERROR: {}", e),
    }

    println!("\n--- Summary ---");
    println!("The credential is only validated by the provider on the first refresh.");
    println!("A rejected key surfaces as API_KEY_INVALID in the refresh state.");
}
