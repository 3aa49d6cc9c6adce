use crate::perception::elements::format_for_prompt;
use crate::perception::types::{AppContext, UIElement};

/// Prompt for on-screen automation inside the app the user is already in.
pub fn build_ui_prompt(instruction: &str, ctx: Option<&AppContext>, elements: &[UIElement]) -> String {
    let mut p = String::with_capacity(2048);
    p.push_str(
        "You are a context-aware Android automation assistant. \
         Generate shell commands based on the CURRENT screen context.\n\n",
    );

    p.push_str("=== CURRENT CONTEXT ===\n");
    p.push_str(&AppContext::summary_or_unknown(ctx));
    p.push_str("\n\n=== AVAILABLE ELEMENTS ===\n");
    p.push_str(&format_for_prompt(elements));
    p.push_str("\n\n=== USER REQUEST ===\n");
    p.push_str(instruction);
    p.push_str("\n\n");

    p.push_str(
        "=== IMPORTANT RULES ===\n\
         1. The user is ALREADY in the app shown above; do not open it again\n\
         2. Use ONLY elements that are visible on the current screen\n\
         3. Generate commands that accomplish the task from the CURRENT state\n\
         4. Return ONLY executable commands, one per line\n\
         5. Use 'input tap X Y' to click elements at their coordinates\n\
         6. Use 'input text' for typing and replace spaces with %s\n\
         7. Add 'sleep 1' between steps so the UI can load\n\
         8. If an element is listed, use its exact coordinates\n\
         9. NO explanations, NO markdown, ONLY commands\n\n",
    );

    p.push_str(
        "=== COMMAND PATTERNS ===\n\
         Click element: input tap <centerX> <centerY>\n\
         Type text: input text 'text%swith%sspaces'\n\
         Press back: input keyevent 4\n\
         Press enter: input keyevent 66\n\
         Wait: sleep 1\n\n",
    );

    p.push_str(
        "=== EXAMPLE 1 ===\n\
         Context: WhatsApp - Chats List\n\
         Elements: Search button at (950,150)\n\
         User: message John saying hello\n\
         Commands:\n\
         input tap 950 150\n\
         sleep 1\n\
         input text 'John'\n\
         sleep 1\n\
         input tap 540 400\n\
         sleep 1\n\
         input text 'hello'\n\
         sleep 0.5\n\
         input tap 950 1850\n\n",
    );

    p.push_str(
        "=== EXAMPLE 2 ===\n\
         Context: Google Maps - Map View\n\
         Elements: Search box at (540,200)\n\
         User: search restaurants near me\n\
         Commands:\n\
         input tap 540 200\n\
         sleep 1\n\
         input text 'restaurants%snear%sme'\n\
         sleep 0.5\n\
         input keyevent 66\n\n",
    );

    p.push_str("Now generate commands for the user's request:\nCommands:");
    p
}

/// Prompt for launching apps and deep links when no foreground context is known.
pub fn build_launch_prompt(instruction: &str) -> String {
    let mut p = String::with_capacity(2048);
    p.push_str(
        "You are an Android shell command generator. Convert the user's natural \
         language request into exact Android shell commands.\n\n",
    );

    p.push_str(
        "RULES:\n\
         1. Return ONLY the shell commands, nothing else\n\
         2. Use one command per line if multiple commands are needed\n\
         3. Use only: am start, input, sleep\n\
         4. For delays between commands, use: sleep 2\n\
         5. No explanations, no markdown, no code blocks\n\
         6. PREFER direct intents and URLs over coordinate-based automation\n\
         7. For WhatsApp messaging, use the URL scheme instead of tapping coordinates\n\
         8. Only use input tap when no direct command is available\n\n",
    );

    p.push_str(
        "COMMON PATTERNS:\n\
         - Open app: am start -n PACKAGE_NAME/ACTIVITY_NAME\n\
         - Open WhatsApp: am start -n com.whatsapp/.HomeActivity\n\
         - Open YouTube: am start -n com.google.android.youtube/.HomeActivity\n\
         - Open Chrome: am start -n com.android.chrome/com.google.android.apps.chrome.Main\n\
         - Open Instagram: am start -n com.instagram.android/.activity.MainTabActivity\n\
         - Type text: input text 'your%stext%shere'\n\
         - Tap screen: input tap X Y\n\
         - Press back: input keyevent 4\n\
         - Press home: input keyevent 3\n\
         - Press enter: input keyevent 66\n\
         - Open URL: am start -a android.intent.action.VIEW -d 'URL'\n\
         - Send WhatsApp message: am start -a android.intent.action.VIEW -d 'https://api.whatsapp.com/send?phone=PHONE&text=MESSAGE'\n\
         - Search YouTube: am start -a android.intent.action.SEARCH -n com.google.android.youtube/.activities.ShellActivity --es query 'SEARCH_TERM'\n\n",
    );

    p.push_str(
        "CONTACT HANDLING:\n\
         - Use contact names directly in WhatsApp URL commands, e.g. phone=CONTACT_NAME\n\
         - Contact names will be replaced with phone numbers automatically\n\
         - Use the exact contact name as mentioned by the user\n\n",
    );

    p.push_str(
        "EXAMPLES:\n\
         User: 'open whatsapp'\n\
         Command: am start -n com.whatsapp/.HomeActivity\n\n\
         User: 'send hi to +919876543210 on whatsapp'\n\
         Command: am start -a android.intent.action.VIEW -d 'https://api.whatsapp.com/send?phone=919876543210&text=hi'\n\n\
         User: 'send message to devraj saying hi'\n\
         Command: am start -a android.intent.action.VIEW -d 'https://api.whatsapp.com/send?phone=devraj&text=hi'\n\n\
         User: 'open youtube and search for music'\n\
         Command: am start -a android.intent.action.SEARCH -n com.google.android.youtube/.activities.ShellActivity --es query 'music'\n\n\
         User: 'type hello world'\n\
         Command: input text 'hello%sworld'\n\n",
    );

    p.push_str("User request: ");
    p.push_str(instruction);
    p.push_str("\nCommand:");
    p
}
