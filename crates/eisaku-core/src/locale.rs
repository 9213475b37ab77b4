#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    Ja,
    En,
}

/// User-facing text for one locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strings {
    pub generating: &'static str,
    pub grading: &'static str,
    pub no_result: &'static str,
    pub error: &'static str,
    pub user_label: &'static str,
    pub assistant_label: &'static str,
    pub busy: &'static str,
    pub empty_transcript: &'static str,
    pub input_title: &'static str,
    pub picker_title: &'static str,
}

const JA: Strings = Strings {
    generating: "問題を生成中",
    grading: "採点中",
    no_result: "（結果がありません）",
    error: "エラーが発生しました。もう一度送信してください。",
    user_label: "あなた",
    assistant_label: "AI",
    busy: "応答を待っています…",
    empty_transcript: "問題を読み込んでいます…",
    input_title: " 解答を入力（！で新しい問題） ",
    picker_title: " 大学を選択 (Enter 決定 / Esc 閉じる) ",
};

const EN: Strings = Strings {
    generating: "generating",
    grading: "grading",
    no_result: "(no result)",
    error: "Something went wrong. Please submit again.",
    user_label: "You",
    assistant_label: "AI",
    busy: "Waiting for a reply...",
    empty_transcript: "Loading a question...",
    input_title: " Answer (！ for a new question) ",
    picker_title: " Select institution (Enter to select, Esc to cancel) ",
};

impl Locale {
    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::Ja => "ja",
            Locale::En => "en",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ja" | "jp" | "japanese" => Some(Locale::Ja),
            "en" | "english" => Some(Locale::En),
            _ => None,
        }
    }

    pub fn strings(&self) -> &'static Strings {
        match self {
            Locale::Ja => &JA,
            Locale::En => &EN,
        }
    }
}
