/*!

This is the long-form manual for `visit_rollup` and `planfact`.

## Input files

`planfact` reads two tables:
* the visit log: one row per planned visit, with the project code, the client,
  the wave, the region, the DSM, the ASM, the RS, the status and the visit date
* the project registry: one row per project, with its code, its portal and its
  start and end dates. It may also carry the client and the wave, which are used
  to fill in missing project codes in the visit log.

Both can be given as CSV files (`csv`) or Excel spreadsheets (`xlsx`). The
column headers are matched case insensitively, ignoring repeated spaces. The
usual Russian and English headers are recognized, and the configuration file
can map any other header to a column.

Dates are read as ISO dates (`2024-05-31`), as `31.05.2024`, as `31/05/2024` or
as Excel serial numbers. An empty date, a date that cannot be read or the
placeholder `1900-01-01` mean that the visit has not taken place yet.

The status `Завершено` (or `completed`) marks a visit as done. `Назначено` (or
`assigned`) marks a visit as assigned to an RS. All other statuses are kept in
the plan but never count as a fact.

## The plan

The plan of a hierarchy leaf (a single RS within a single project, client,
wave, region, DSM and ASM) is the number of visit records of that leaf,
whatever their status.

The life of a project is split in four stages of nearly equal length. With a
duration of `D` days, each stage lasts `D / 4` days, and the `D % 4` remaining
days go to the first stages, one each. For example, a project of 10 days has
stages of 3, 3, 2 and 2 days.

The plan is shared among the stages following the stage weights (all equal by
default). The last stage receives whatever the first three did not, so that the
four stage plans always add up to the total. Within a stage, the plan is spread
evenly over its days. A project shorter than four days has stages without
days; their plan goes to the days of the last stage that has some.

The plan for the reporting period is the sum, over the days of the period that
fall within the project, of the daily plan of that day. A project without a
start or an end date in the registry, or one that is not in the registry at
all, has no plan.

Plans are rounded to one decimal place at the leaves. Aggregated rows add up
the rounded values of their leaves.

## The rollup

Every leaf is rolled up to the ASM, DSM, region, wave, client and project
levels. The plans, the facts and the counts of assigned visits are sums. The
portal of an aggregated row is the most common known portal among its leaves.
The dates and the duration are those of the project.

The columns that an aggregated row does not break down are filled with `Total`.

## The metrics

For each row:
* `percentOfPeriod` is the fact for the period over the plan for the period
* `percentOfProject` is the fact over the plan for the whole project
* `forecastQuantity` projects the current completion onto the plan
* `timeUtilizationPercent` is the share of the project's days elapsed at the
  end of the reporting period
* `focus` marks the rows that are below 80% of their plan while more than 80%
  (but not all) of the project's time is spent

A ratio with a zero denominator is reported as 0.

*/
