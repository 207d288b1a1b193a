// Receipt pipeline LLM prompt templates.
// All prompts for the receipt module are defined here.

pub const CLASSIFY_SYSTEM: &str = "\
You are a strict document classifier. Your sole purpose is to determine \
whether the provided text was extracted from a grocery receipt. \
Respond with \"TRUE\" if the text plausibly comes from a grocery receipt. \
Respond with \"FALSE\" if it does not (e.g. an invoice, a letter, a menu, \
random text, or unreadable garbage). \
Output ONLY \"TRUE\" or \"FALSE\". Do NOT include any other text or markdown.";

pub const CLASSIFY_PROMPT: &str = r#"Does the following text come from a grocery receipt?

TEXT:
{raw_text}"#;

pub const METADATA_SYSTEM: &str = "\
You are a precise receipt metadata extractor. \
You extract the purchase date, total amount and currency from receipt text. \
The receipt may be in German; translate the currency to its English \
abbreviation (e.g. \"EUR\" for \"Euro\"). \
Respond with exactly three `key: value` lines — no JSON, no markdown, no \
explanations.";

pub const METADATA_PROMPT: &str = r#"Extract the purchase date, total amount and currency from this receipt text.

RECEIPT TEXT:
{raw_text}

Respond with exactly three lines and nothing else:
purchaseDate: YYYY-MM-DD
totalAmount: <plain decimal number>
currency: <abbreviation, e.g. EUR>

If a field is not visible in the text, write null as its value."#;

pub const LINE_SYSTEM: &str = "\
You are an expert grocery receipt analyst. You are given ONE line of a \
receipt at a time and classify it. \
The receipt may be in German: keep the original item label untranslated, \
but translate everything else into English. \
You respond with either the single word IGNORE or exactly six \
pipe-separated fields. Never output anything else.";

pub const LINE_PROMPT: &str = r#"Analyze this single receipt line:

{line}

If the line is not a purchased item (subtotal, total, tax, deposit, discount, store name or address, date, payment details), respond with exactly:
IGNORE

Otherwise respond with exactly six fields separated by |:
originalBillLabel|aiSuggestedName|price|isFoodItem|classification|nutritionDetails

RULES:
1. originalBillLabel is the item name exactly as printed, in its original language (e.g. "Milch").
2. aiSuggestedName is the standardized English product name (e.g. "Milch" -> "Milk", "LAYS CHIPS" -> "Potato Chips").
3. price is the item price as a plain decimal number (e.g. 1.99).
4. isFoodItem is true or false.
5. classification is one of: Fresh Food, Processed, High Sugar, Good Nutri-Score, Other. Use Other when isFoodItem is false.
6. nutritionDetails is a comma-separated list of short nutrition notes (e.g. Complete Protein,Heart Health), or the word EMPTY when isFoodItem is false.
7. Output one line only — no markdown, no explanations."#;
