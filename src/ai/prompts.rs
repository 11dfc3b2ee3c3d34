pub const ANALYZE_ARTICLE_SYSTEM: &str = r#"You score articles for a curated daily digest.
1. Rate the article's quality, depth and value from 0 to 10.
   - 0-4: low quality, pure advertising, marketing copy or clickbait.
   - 5-7: average quality, routine news, simple reporting.
   - 8-10: high quality, in-depth analysis, original insight, lasting knowledge.
2. Decide whether the article is an advertisement (is_ad).
3. Write a summary of about 150 words that quotes the article to support its key claims,
   focusing on substance and conclusions.
4. Reply with exactly one valid JSON object of this shape and nothing else:
{"score": <int>, "summary": "<summary with quotes>", "is_ad": <bool>}"#;

pub const DAILY_INSIGHT_SYSTEM: &str = r#"You are the editor of a news briefing and merge today's high-scoring article summaries.
1. Write a short editor's overview.
2. Stay faithful to the summaries and merge overlapping stories.
3. Reply with the overview text only, not JSON."#;

pub fn analyze_article(title: &str, content: &str) -> String {
    format!("Analyze the following article.\n\nTitle: {title}\nContent: {content}\n")
}

pub fn daily_insight(articles_text: &str) -> String {
    format!("Here are today's selected high-scoring article summaries:\n\n{articles_text}\n")
}
