//! HTML report generation with D3.js visualizations

use super::{AnalysisReport, Summary};
use std::io::{self, Write};

/// Link rows embedded in the page; the full list is in the JSON report
pub const MAX_LINK_ROWS: usize = 500;

pub fn write<W: Write>(writer: &mut W, report: &AnalysisReport) -> io::Result<()> {
    let summary = Summary::from_report(report);
    let json_data = build_json_data(report)?;
    let scope = report.analysis.config.scope;

    write!(writer, r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Rental Gap Analysis Report</title>
    <script src="https://d3js.org/d3.v7.min.js"></script>
    <style>
        :root {{
            --bg: #0d1117;
            --card: #161b22;
            --border: #30363d;
            --text: #e6edf3;
            --dim: #7d8590;
            --ok: #3fb950;
            --warn: #d29922;
            --bad: #f85149;
            --accent: #58a6ff;
        }}
        * {{ box-sizing: border-box; margin: 0; padding: 0; }}
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', 'Noto Sans', Helvetica, Arial, sans-serif;
            background: var(--bg);
            color: var(--text);
            line-height: 1.5;
        }}
        .container {{ max-width: 1600px; margin: 0 auto; padding: 2rem; }}
        .header {{
            margin-bottom: 2rem;
            padding-bottom: 1rem;
            border-bottom: 1px solid var(--border);
        }}
        .logo {{
            font-size: 2.5rem;
            font-weight: 800;
            background: linear-gradient(135deg, var(--accent), #a371f7);
            -webkit-background-clip: text;
            -webkit-text-fill-color: transparent;
        }}
        .subtitle {{ color: var(--dim); font-size: 1rem; }}
        .stats {{
            display: grid;
            grid-template-columns: repeat(5, 1fr);
            gap: 1rem;
            margin-bottom: 2rem;
        }}
        .stat {{
            background: var(--card);
            border: 1px solid var(--border);
            border-radius: 12px;
            padding: 1.5rem;
            text-align: center;
        }}
        .stat-value {{ font-size: 2.5rem; font-weight: 700; line-height: 1; }}
        .stat-label {{ color: var(--dim); font-size: 0.875rem; text-transform: uppercase; letter-spacing: 0.05em; margin-top: 0.5rem; }}
        .stat.ok .stat-value {{ color: var(--ok); }}
        .stat.warn .stat-value {{ color: var(--warn); }}
        .stat.bad .stat-value {{ color: var(--bad); }}
        .charts {{
            display: grid;
            grid-template-columns: 1fr 1fr;
            gap: 1.5rem;
            margin-bottom: 2rem;
        }}
        .chart-card, .table-container {{
            background: var(--card);
            border: 1px solid var(--border);
            border-radius: 12px;
            padding: 1.5rem;
            margin-bottom: 2rem;
        }}
        .chart-title {{
            font-size: 1rem;
            font-weight: 600;
            margin-bottom: 1rem;
            color: var(--dim);
        }}
        table {{ width: 100%; border-collapse: collapse; }}
        th, td {{ padding: 0.6rem 1rem; text-align: left; }}
        th {{
            background: rgba(255,255,255,0.03);
            font-weight: 600;
            font-size: 0.75rem;
            text-transform: uppercase;
            letter-spacing: 0.05em;
            color: var(--dim);
            border-bottom: 1px solid var(--border);
        }}
        td {{ border-bottom: 1px solid var(--border); font-family: 'SF Mono', monospace; font-size: 0.85rem; }}
        tr:last-child td {{ border-bottom: none; }}
        tr:hover td {{ background: rgba(255,255,255,0.02); }}
        .flag-bad {{ color: var(--bad); font-weight: 600; }}
        .flag-masked {{ color: var(--warn); }}
        .dim {{ color: var(--dim); }}
        .bar {{ fill: var(--accent); }}
        .bar.late {{ fill: var(--bad); }}
        .bar.early {{ fill: var(--ok); }}
        .tooltip {{
            position: absolute;
            background: var(--card);
            border: 1px solid var(--border);
            border-radius: 8px;
            padding: 0.75rem 1rem;
            font-size: 0.875rem;
            pointer-events: none;
            opacity: 0;
            transition: opacity 0.15s;
            z-index: 1000;
        }}
        .tooltip.visible {{ opacity: 1; }}
        .footer {{
            margin-top: 2rem;
            padding-top: 1rem;
            border-top: 1px solid var(--border);
            color: var(--dim);
            font-size: 0.875rem;
            text-align: center;
        }}
    </style>
</head>
<body>
    <div class="container">
        <div class="header">
            <div class="logo">Rental Gap</div>
            <div class="subtitle">Checkout delays, chained rentals and buffer simulation (scope: {scope})</div>
        </div>

        <div class="stats">
            <div class="stat">
                <div class="stat-value">{rentals}</div>
                <div class="stat-label">Rentals ({excluded} excluded)</div>
            </div>
            <div class="stat warn">
                <div class="stat-value">{unreported:.1}%</div>
                <div class="stat-label">Unreported returns</div>
            </div>
            <div class="stat">
                <div class="stat-value">{links}</div>
                <div class="stat-label">Chained links</div>
            </div>
            <div class="stat bad">
                <div class="stat-value">{conflicts}</div>
                <div class="stat-label">Conflicts, no buffer</div>
            </div>
            <div class="stat ok">
                <div class="stat-value">{resolved}</div>
                <div class="stat-label">Resolved at {buffer} min ({masked} masked)</div>
            </div>
        </div>

        <div class="charts">
            <div class="chart-card">
                <div class="chart-title">Checkout delay distribution (minutes, clipped)</div>
                <div id="histogram-chart"></div>
            </div>
            <div class="chart-card">
                <div class="chart-title">Buffer ROI curve</div>
                <div id="roi-chart"></div>
            </div>
        </div>

        <div class="table-container">
            <div class="chart-title">Cancellation of the next rental by previous delay</div>
            <table>
                <thead><tr><th>Previous delay</th><th>Links</th><th>Next canceled</th><th>Rate</th></tr></thead>
                <tbody id="cascade-table"></tbody>
            </table>
            <div class="dim" id="cascade-note"></div>
        </div>

        <div class="table-container">
            <div class="chart-title">Buffer sweep</div>
            <table>
                <thead><tr><th>Buffer</th><th>Evaluated</th><th>Masked</th><th>Masking rate</th><th>Remaining</th><th>Resolved</th><th>Avoided</th><th>Efficiency</th></tr></thead>
                <tbody id="sweep-table"></tbody>
            </table>
        </div>

        <div class="table-container">
            <div class="chart-title">Chained links at {buffer} min</div>
            <table>
                <thead><tr><th>Vehicle</th><th>Previous</th><th>Next</th><th>Gap</th><th>Prev delay</th><th>Conflict</th><th>Masked</th><th>Conflict w/ buffer</th></tr></thead>
                <tbody id="links-table"></tbody>
            </table>
            <div class="dim" id="links-note"></div>
        </div>

        <div class="footer">
            Generated by rentalgap {version} at {generated}
        </div>
    </div>

    <div class="tooltip" id="tooltip"></div>

    <script>
    const data = {json_data};

    const tooltip = document.getElementById('tooltip');
    function showTooltip(event, html) {{
        tooltip.innerHTML = html;
        tooltip.style.left = (event.pageX + 12) + 'px';
        tooltip.style.top = (event.pageY - 12) + 'px';
        tooltip.classList.add('visible');
    }}
    function hideTooltip() {{ tooltip.classList.remove('visible'); }}

    const pct = v => (v === null || v === undefined) ? '-' : (v * 100).toFixed(1) + '%';
    const esc = v => String(v).replace(/[&<>"']/g, c =>
        ({{'&': '&amp;', '<': '&lt;', '>': '&gt;', '"': '&quot;', "'": '&#39;'}})[c]);
    const opt = v => (v === null || v === undefined) ? '-' : esc(v);

    function drawHistogram() {{
        const container = document.getElementById('histogram-chart');
        const margin = {{ top: 20, right: 20, bottom: 50, left: 50 }};
        const width = container.clientWidth - margin.left - margin.right;
        const height = 300 - margin.top - margin.bottom;
        const bins = data.histogram;
        if (!bins.length) return;

        const svg = d3.select('#histogram-chart').append('svg')
            .attr('width', width + margin.left + margin.right)
            .attr('height', height + margin.top + margin.bottom)
            .append('g')
            .attr('transform', `translate(${{margin.left}},${{margin.top}})`);

        const x = d3.scaleLinear()
            .domain([bins[0].lower, bins[bins.length - 1].upper])
            .range([0, width]);
        const y = d3.scaleLinear()
            .domain([0, d3.max(bins, d => d.count) || 1])
            .nice()
            .range([height, 0]);

        svg.selectAll('.bar')
            .data(bins)
            .enter()
            .append('rect')
            .attr('class', d => d.upper <= 0 ? 'bar early' : (d.lower > 0 ? 'bar late' : 'bar'))
            .attr('x', d => x(d.lower) + 1)
            .attr('width', d => Math.max(0, x(d.upper) - x(d.lower) - 1))
            .attr('y', d => y(d.count))
            .attr('height', d => height - y(d.count))
            .on('mouseover', (event, d) => showTooltip(event, `${{d.lower}} to ${{d.upper}} min: ${{d.count}}`))
            .on('mouseout', hideTooltip);

        svg.append('g')
            .attr('transform', `translate(0,${{height}})`)
            .call(d3.axisBottom(x).ticks(8))
            .style('color', '#7d8590');
        svg.append('g').call(d3.axisLeft(y).ticks(5)).style('color', '#7d8590');
    }}

    function drawRoiCurve() {{
        const container = document.getElementById('roi-chart');
        const margin = {{ top: 20, right: 20, bottom: 50, left: 50 }};
        const width = container.clientWidth - margin.left - margin.right;
        const height = 300 - margin.top - margin.bottom;
        const points = data.roi.points;
        if (!points.length) return;

        const svg = d3.select('#roi-chart').append('svg')
            .attr('width', width + margin.left + margin.right)
            .attr('height', height + margin.top + margin.bottom)
            .append('g')
            .attr('transform', `translate(${{margin.left}},${{margin.top}})`);

        const x = d3.scaleLinear()
            .domain(d3.extent(points, d => d.buffer_minutes))
            .range([0, width]);
        const y = d3.scaleLinear().domain([0, 1]).range([height, 0]);

        const series = [
            {{ key: 'masking_rate', label: 'Masked links', color: '#d29922' }},
            {{ key: 'avoided_rate', label: 'Conflicts avoided', color: '#3fb950' }}
        ];
        series.forEach(s => {{
            svg.append('path')
                .datum(points)
                .attr('fill', 'none')
                .attr('stroke', s.color)
                .attr('stroke-width', 2)
                .attr('d', d3.line().x(d => x(d.buffer_minutes)).y(d => y(d[s.key])));
            svg.selectAll(null)
                .data(points)
                .enter()
                .append('circle')
                .attr('cx', d => x(d.buffer_minutes))
                .attr('cy', d => y(d[s.key]))
                .attr('r', 4)
                .attr('fill', s.color)
                .on('mouseover', (event, d) => showTooltip(event, `${{s.label}} at ${{d.buffer_minutes}} min: ${{pct(d[s.key])}}`))
                .on('mouseout', hideTooltip);
        }});

        svg.append('line')
            .attr('x1', x(data.selected.buffer_minutes))
            .attr('x2', x(data.selected.buffer_minutes))
            .attr('y1', 0)
            .attr('y2', height)
            .attr('stroke', '#58a6ff')
            .attr('stroke-dasharray', '5,5');

        svg.append('g')
            .attr('transform', `translate(0,${{height}})`)
            .call(d3.axisBottom(x).ticks(8).tickFormat(d => d + ' min'))
            .style('color', '#7d8590');
        svg.append('g')
            .call(d3.axisLeft(y).ticks(5).tickFormat(d => (d * 100) + '%'))
            .style('color', '#7d8590');
    }}

    function fillTables() {{
        document.getElementById('cascade-table').innerHTML = data.cascade.buckets.map(b =>
            `<tr><td>${{esc(b.label)}} min</td><td>${{b.links}}</td><td>${{b.next_canceled}}</td><td>${{pct(b.cancellation_rate)}}</td></tr>`
        ).join('');
        document.getElementById('cascade-note').textContent =
            `${{data.cascade.unknown_previous_delay}} link(s) skipped: previous return unknown`;

        document.getElementById('sweep-table').innerHTML = data.roi.points.map(p =>
            `<tr><td>${{p.buffer_minutes}} min</td><td>${{p.evaluated_links}}</td><td>${{p.links_masked}}</td><td>${{pct(p.masking_rate)}}</td>` +
            `<td>${{p.conflicts_remaining}}</td><td>${{p.conflicts_resolved}}</td><td>${{p.conflicts_avoided}}</td><td>${{pct(p.resolution_efficiency)}}</td></tr>`
        ).join('');

        document.getElementById('links-table').innerHTML = data.links.map(l =>
            `<tr><td>${{esc(l.vehicle_id)}}</td><td>${{l.previous_rental_id}}</td><td>${{l.next_rental_id}}</td><td>${{l.gap_minutes}}</td>` +
            `<td>${{opt(l.previous_delay_minutes)}}</td>` +
            `<td class="${{l.conflict ? 'flag-bad' : ''}}">${{opt(l.conflict)}}</td>` +
            `<td class="${{l.masked ? 'flag-masked' : ''}}">${{l.masked}}</td>` +
            `<td class="${{l.conflict_with_buffer ? 'flag-bad' : ''}}">${{opt(l.conflict_with_buffer)}}</td></tr>`
        ).join('');
        if (data.links_total > data.links.length) {{
            document.getElementById('links-note').textContent =
                `Showing ${{data.links.length}} of ${{data.links_total}} links; see the JSON report for all`;
        }}
    }}

    drawHistogram();
    drawRoiCurve();
    fillTables();
    </script>
</body>
</html>
"#,
        scope = scope,
        rentals = summary.rentals,
        excluded = summary.excluded,
        unreported = summary.unreported_rate * 100.0,
        links = summary.links,
        conflicts = summary.conflicts,
        resolved = summary.conflicts_resolved,
        buffer = summary.selected_buffer,
        masked = summary.masked,
        version = html_escape(&report.version),
        generated = report.generated.format("%Y-%m-%d %H:%M:%S UTC"),
        json_data = json_data,
    )
}

/// Page data: the chart inputs plus a bounded slice of the link table.
fn build_json_data(report: &AnalysisReport) -> io::Result<String> {
    let analysis = &report.analysis;
    let links = &analysis.links[..analysis.links.len().min(MAX_LINK_ROWS)];
    let value = serde_json::json!({
        "histogram": analysis.histogram,
        "roi": analysis.roi,
        "selected": analysis.selected,
        "cascade": analysis.cascade,
        "links": links,
        "links_total": analysis.links.len(),
    });
    let json = serde_json::to_string(&value)?;
    // No markup characters inside the script block; JSON decodes them back
    Ok(json
        .replace('&', "\\u0026")
        .replace('<', "\\u003c")
        .replace('>', "\\u003e"))
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::fixtures::sample_report;

    fn render(report: &AnalysisReport) -> String {
        let mut buf = Vec::new();
        write(&mut buf, report).unwrap();
        String::from_utf8(buf).unwrap()
    }

    // ==========================================================================
    // PAGE STRUCTURE
    // ==========================================================================
    //
    // The page is self-contained apart from D3. Chart containers and their
    // draw calls must both be present or the page renders empty cards.
    // ==========================================================================

    #[test]
    fn test_html_contains_chart_containers_and_calls() {
        let html = render(&sample_report());
        assert!(html.contains("id=\"histogram-chart\""));
        assert!(html.contains("id=\"roi-chart\""));
        assert!(html.contains("drawHistogram();"));
        assert!(html.contains("drawRoiCurve();"));
        assert!(html.contains("fillTables();"));
    }

    #[test]
    fn test_html_headline_numbers() {
        let html = render(&sample_report());
        assert!(html.contains("Resolved at 30 min (1 masked)"));
        assert!(html.contains("scope: all"));
    }

    #[test]
    fn test_embedded_data_is_valid_json() {
        let report = sample_report();
        let json = build_json_data(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["links_total"], 4);
        assert_eq!(value["roi"]["points"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_script_close_in_vehicle_id_is_escaped() {
        let mut report = sample_report();
        report.analysis.links[0].vehicle_id = "</script><b>".to_string();
        let html = render(&report);
        assert!(!html.contains("</script><b>"));
        assert!(html.contains("\\u003c/script\\u003e\\u003cb\\u003e"));
    }

    #[test]
    fn test_markup_in_vehicle_id_is_never_raw_html() {
        let payload = "<img src=x onerror=alert(1)>";
        let mut report = sample_report();
        report.analysis.links[0].vehicle_id = payload.to_string();

        let json = build_json_data(&report).unwrap();
        assert!(!json.contains('<'));
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["links"][0]["vehicle_id"], payload);

        let html = render(&report);
        assert!(!html.contains(payload));
        // Table cells escape input text before it reaches innerHTML
        assert!(html.contains("const esc = v =>"));
        assert!(html.contains("${esc(l.vehicle_id)}"));
        assert!(html.contains("${esc(b.label)}"));
        assert!(!html.contains("${l.vehicle_id}"));
    }

    #[test]
    fn test_link_rows_are_bounded() {
        let mut report = sample_report();
        let row = report.analysis.links[0].clone();
        report.analysis.links = vec![row; MAX_LINK_ROWS + 10];
        let value: serde_json::Value =
            serde_json::from_str(&build_json_data(&report).unwrap()).unwrap();
        assert_eq!(value["links"].as_array().unwrap().len(), MAX_LINK_ROWS);
        assert_eq!(value["links_total"], MAX_LINK_ROWS + 10);
    }
}
