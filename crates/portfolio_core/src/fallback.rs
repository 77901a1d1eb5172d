//! crates/portfolio_core/src/fallback.rs
//!
//! The sample roster shown while the remote API is unreachable or not yet
//! configured.

use crate::domain::{DocumentEntry, Documents, HistoryEntry, SchoolingEntry, StudentRecord};

fn history(date: &str, event: &str) -> HistoryEntry {
    HistoryEntry {
        date: date.to_string(),
        event: event.to_string(),
    }
}

fn doc(title: &str, date: &str) -> DocumentEntry {
    DocumentEntry {
        title: title.to_string(),
        date: date.to_string(),
        url: "#".to_string(),
    }
}

fn schooling(title: &str, date: &str) -> SchoolingEntry {
    SchoolingEntry {
        title: title.to_string(),
        date: date.to_string(),
        url: "#".to_string(),
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Placeholder students. Ids are stable so links into the sample data work.
pub fn sample_roster() -> Vec<StudentRecord> {
    vec![
        StudentRecord {
            id: "yamada-taro".to_string(),
            name: "山田 太郎".to_string(),
            name_kana: "やまだ たろう".to_string(),
            grade: "中学3年".to_string(),
            school: "相生中学校".to_string(),
            enroll_date: "2024-04-01".to_string(),
            icon_color: "#6C63FF".to_string(),
            subjects: strings(&["数学", "英語", "国語", "理科"]),
            memo: "数学が得意。英語の長文読解に課題あり。".to_string(),
            learning_history: vec![
                history("2024-04-01", "入塾（数学・英語）"),
                history("2024-07-20", "夏期講習受講（国語追加）"),
                history("2024-09-10", "理科追加受講開始"),
            ],
            documents: Documents {
                meetings: vec![doc("入塾面談", "2024-04-01"), doc("第1回定期面談", "2024-07-10")],
                grades: vec![doc("1学期期末テスト結果", "2024-07-15")],
                homework: vec![doc("夏期講習課題一覧", "2024-07-20")],
            },
            schooling_results: vec![schooling("Vテスト 第1回結果", "2024-08-25")],
            ..Default::default()
        },
        StudentRecord {
            id: "sato-hanako".to_string(),
            name: "佐藤 花子".to_string(),
            name_kana: "さとう はなこ".to_string(),
            grade: "中学2年".to_string(),
            school: "第一中学校".to_string(),
            enroll_date: "2024-09-01".to_string(),
            icon_color: "#FF6B9D".to_string(),
            subjects: strings(&["数学", "英語"]),
            memo: "英語が得意。部活: バスケットボール部".to_string(),
            learning_history: vec![history("2024-09-01", "入塾（数学・英語）")],
            documents: Documents {
                meetings: vec![doc("入塾面談", "2024-09-01")],
                ..Default::default()
            },
            ..Default::default()
        },
    ]
}
