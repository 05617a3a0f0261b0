use std::{collections::HashMap, fmt::Write, sync::Arc};

use chrono::NaiveDate;

use crate::{config::AppLanguage, daemon::storage::entities::ActivityRecord};

/// Usage numbers a prompt is written from.
#[derive(Debug, PartialEq)]
pub struct DaySummary {
    pub total_seconds: i64,
    pub work_seconds: i64,
    /// Seconds per application, most used first.
    pub applications: Vec<(Arc<str>, i64)>,
    /// Work apps as snapshotted by the first record of the day.
    pub work_apps: Vec<String>,
}

impl DaySummary {
    /// Aggregates the records that started on `day`.
    pub fn from_records(records: &[ActivityRecord], day: NaiveDate) -> Self {
        let records = records
            .iter()
            .filter(|record| record.day() == day)
            .collect::<Vec<_>>();
        let work_apps = records
            .first()
            .map(|record| record.work_apps().to_vec())
            .unwrap_or_default();

        let mut usage = HashMap::<Arc<str>, i64>::new();
        let mut total_seconds = 0;
        let mut work_seconds = 0;
        for record in records {
            let seconds = record.duration_in_seconds();
            total_seconds += seconds;
            if work_apps.iter().any(|app| app.as_str() == &**record.application()) {
                work_seconds += seconds;
            }
            *usage.entry(record.application().clone()).or_default() += seconds;
        }

        let mut applications = usage.into_iter().collect::<Vec<_>>();
        applications.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Self {
            total_seconds,
            work_seconds,
            applications,
            work_apps,
        }
    }

    fn is_work_app(&self, application: &str) -> bool {
        self.work_apps.iter().any(|app| app == application)
    }

    fn breakdown(&self) -> String {
        let mut lines = String::new();
        for (application, seconds) in &self.applications {
            if !lines.is_empty() {
                lines.push('\n');
            }
            let tag = if self.is_work_app(application) {
                "[Work App]"
            } else {
                "[Personal]"
            };
            let _ = write!(
                lines,
                "- {application}: {:.1}h ({}m) {tag}",
                hours(*seconds),
                (seconds % 3600) / 60
            );
        }
        lines
    }
}

fn hours(seconds: i64) -> f64 {
    seconds as f64 / 3600.
}

/// Builds the insight request for `day` in `language`.
pub fn build_prompt(records: &[ActivityRecord], day: NaiveDate, language: AppLanguage) -> String {
    let summary = DaySummary::from_records(records, day);
    let total = hours(summary.total_seconds);
    let work = hours(summary.work_seconds);
    let personal = total - work;
    let app_count = summary.applications.len();
    let breakdown = summary.breakdown();
    let work_apps = summary.work_apps.join(", ");

    match language {
        AppLanguage::English => {
            let date = day.format("%A, %B %-d, %Y");
            format!(
                "Please analyze my productivity data for {date} and provide a fun, engaging, and insightful summary. Here's my activity data:

## 📊 Overall Statistics:
- **Total Active Time:** {total:.1} hours
- **Work Time:** {work:.1} hours
- **Personal Time:** {personal:.1} hours
- **Number of Applications Used:** {app_count}

## 📱 Application Usage Breakdown:
{breakdown}

## 🎯 Work Applications:
{work_apps}

Please provide a fun and engaging analysis in **markdown format** that includes:
1. **A catchy title or emoji-rich summary**
2. **Key insights about my productivity patterns**
3. **Most productive hours/applications**
4. **Balance between work and personal time**
5. **Fun observations or gentle suggestions for improvement**
6. **A motivational closing remark**

Make it personal, encouraging, and slightly humorous while being informative. Use emojis, bullet points, and proper markdown formatting to make it more engaging!"
            )
        }
        AppLanguage::Chinese => {
            let date = day.format("%Y年%-m月%-d日");
            format!(
                "请分析我在{date}的工作效率数据，并提供一个有趣、引人入胜且富有洞察力的总结。以下是我的活动数据：

## 📊 总体统计：
- **总活跃时间：** {total:.1} 小时
- **工作时间：** {work:.1} 小时
- **个人时间：** {personal:.1} 小时
- **使用的应用程序数量：** {app_count}

## 📱 应用程序使用详情：
{breakdown}

## 🎯 工作应用程序：
{work_apps}

请提供一个有趣且引人入胜的**markdown格式**分析，包括：
1. **吸引人的标题或富含表情符号的摘要**
2. **关于我的工作效率模式的关键洞察**
3. **最高效的时间段/应用程序**
4. **工作与个人时间的平衡**
5. **有趣的观察或温和的改进建议**
6. **激励性的结尾语**

请用个人化、鼓励性和略带幽默的方式提供信息。使用表情符号、项目符号和适当的markdown格式使其更具吸引力！"
            )
        }
    }
}
