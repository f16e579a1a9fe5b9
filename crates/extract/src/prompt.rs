pub fn build_extraction_prompt(text: &str) -> String {
    format!(
        r#"Extract the named entities mentioned in the following text.

INSTRUCTIONS:
1. Identify people, organizations, locations, dates, money amounts, products and roles
2. Copy each entity exactly as it is written in the text
3. Output ONLY valid JSON, nothing else
4. Use the exact schema below

SCHEMA:
{{
  "entities": [
    {{"text": "surface form from the text", "label": "PERSON|ORG|LOC|DATE|MONEY|PRODUCT|ROLE|MISC"}}
  ]
}}

RULES:
- Do not translate or paraphrase entity text
- If there are no entities, output {{"entities": []}}
- Output ONLY the JSON object, no markdown, no explanations

TEXT:
{}

JSON OUTPUT:"#,
        text
    )
}

pub fn build_retry_prompt(invalid_json: &str) -> String {
    format!(
        r#"The following JSON is invalid:

{}

Fix this JSON. Output only valid JSON with no markdown formatting, no code blocks, no explanations. Just the raw JSON object."#,
        invalid_json
    )
}
